//! Rapport de rejeu d'un journal de parcours

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Parcours refusé pendant le rejeu
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRoute {
    /// Numéro de ligne dans le journal (à partir de 1)
    pub line: usize,
    /// Pseudo du joueur, si lisible
    pub owner: Option<String>,
    pub message: String,
}

/// Rapport complet de rejeu
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub duration_secs: f64,
    pub routes_accepted: usize,
    pub players_registered: usize,
    pub total_area_gained_m2: f64,
    pub total_distance_m: f64,
    /// Zones présentes à la fin du rejeu
    pub regions: usize,
    pub rejected: Vec<RejectedRoute>,
}

impl ReplayReport {
    pub fn record_accepted(&mut self, area_gained_m2: f64, distance_m: f64) {
        self.routes_accepted += 1;
        self.total_area_gained_m2 += area_gained_m2;
        self.total_distance_m += distance_m;
    }

    pub fn record_rejected(&mut self, line: usize, owner: Option<String>, message: String) {
        self.rejected.push(RejectedRoute {
            line,
            owner,
            message,
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("REPLAY REPORT");
        println!("{}", "=".repeat(60));

        println!("Duration: {:.2}s", self.duration_secs);
        println!(
            "Routes: {} accepted, {} rejected",
            self.routes_accepted,
            self.rejected.len()
        );
        println!("Players registered: {}", self.players_registered);
        println!(
            "Area gained: {:.0} m², distance: {:.0} m, regions: {}",
            self.total_area_gained_m2, self.total_distance_m, self.regions
        );

        if !self.rejected.is_empty() {
            println!("\n--- REJECTED ({}) ---", self.rejected.len());
            for r in self.rejected.iter().take(20) {
                let owner = r.owner.as_deref().unwrap_or("?");
                println!("  [line {}] {}: {}", r.line, owner, r.message);
            }
            if self.rejected.len() > 20 {
                println!("  ... and {} more", self.rejected.len() - 20);
            }
        }

        println!("{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Résumé sur une ligne
    pub fn summary(&self) -> String {
        format!(
            "{} accepted, {} rejected, {:.0} m² gained",
            self.routes_accepted,
            self.rejected.len(),
            self.total_area_gained_m2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_totals() {
        let mut report = ReplayReport::default();
        report.record_accepted(100.0, 40.0);
        report.record_accepted(0.0, 60.0);
        report.record_rejected(3, Some("bob".into()), "open route".into());

        assert_eq!(report.routes_accepted, 2);
        assert_eq!(report.total_area_gained_m2, 100.0);
        assert_eq!(report.total_distance_m, 100.0);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.summary(), "2 accepted, 1 rejected, 100 m² gained");
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = ReplayReport::default();
        report.record_rejected(1, None, "bad json".into());
        report.save_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["rejected"][0]["line"], 1);
    }
}
