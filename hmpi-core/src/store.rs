//! SQLite persistence for samples, results and alert settings
//!
//! Global invariants enforced:
//! - A batch is inserted in a single transaction (all or nothing)
//! - Ids are assigned in input order; listings are id ascending
//! - At most one alert configuration row exists

use crate::alerts::{parse_recipients, AlertConfig};
use crate::indices::{CdCategory, HpiCategory, IndexResult};
use crate::report::{AssessedSample, StoredSample};
use crate::sample::{Concentrations, Sample};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Handle to the sample database
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at `path` and run migrations
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// Fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Store { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS water_samples (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    "As" REAL,
                    "Cd" REAL,
                    "Pb" REAL,
                    "Zn" REAL
                );

                CREATE TABLE IF NOT EXISTS pollution_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sample_id INTEGER NOT NULL UNIQUE REFERENCES water_samples(id),
                    "HPI" REAL NOT NULL,
                    hpi_category TEXT NOT NULL,
                    "Cd_value" REAL NOT NULL,
                    cd_category TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS alert_configs (
                    id INTEGER PRIMARY KEY,
                    hpi_threshold REAL NOT NULL,
                    cd_threshold REAL NOT NULL,
                    email_recipients TEXT NOT NULL DEFAULT '',
                    sms_recipients TEXT NOT NULL DEFAULT '',
                    policy_json TEXT NOT NULL DEFAULT '{}'
                );
                "#,
            )
            .context("failed to migrate database schema")?;
        Ok(())
    }

    /// Persist assessed samples; returns them with their new ids
    pub fn insert_assessed(&mut self, assessed: &[AssessedSample]) -> Result<Vec<StoredSample>> {
        let tx = self.conn.transaction()?;
        let mut stored = Vec::with_capacity(assessed.len());
        {
            let mut insert_sample = tx.prepare(
                r#"INSERT INTO water_samples (latitude, longitude, "As", "Cd", "Pb", "Zn")
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            )?;
            let mut insert_result = tx.prepare(
                r#"INSERT INTO pollution_results (sample_id, "HPI", hpi_category, "Cd_value", cd_category)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;

            for item in assessed {
                let c = &item.sample.concentrations;
                let id = insert_sample.insert(params![
                    item.sample.latitude,
                    item.sample.longitude,
                    c.arsenic,
                    c.cadmium,
                    c.lead,
                    c.zinc,
                ])?;
                insert_result.execute(params![
                    id,
                    item.result.hpi_value,
                    item.result.hpi_category.as_str(),
                    item.result.cd_value,
                    item.result.cd_category.as_str(),
                ])?;
                stored.push(StoredSample {
                    id,
                    sample: item.sample,
                    result: item.result,
                });
            }
        }
        tx.commit().context("failed to commit sample batch")?;
        tracing::debug!(count = stored.len(), "inserted samples");
        Ok(stored)
    }

    /// Every stored sample with its result, id ascending
    pub fn list_samples(&self) -> Result<Vec<StoredSample>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT s.id, s.latitude, s.longitude, s."As", s."Cd", s."Pb", s."Zn",
                      r."HPI", r.hpi_category, r."Cd_value", r.cd_category
               FROM water_samples s
               JOIN pollution_results r ON r.sample_id = s.id
               ORDER BY s.id ASC"#,
        )?;

        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    Sample::new(
                        r.get(1)?,
                        r.get(2)?,
                        Concentrations::new(r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?),
                    ),
                    r.get::<_, f64>(7)?,
                    r.get::<_, String>(8)?,
                    r.get::<_, f64>(9)?,
                    r.get::<_, String>(10)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, sample, hpi_value, hpi_category, cd_value, cd_category)| {
                let result = IndexResult {
                    hpi_value,
                    hpi_category: hpi_category.parse::<HpiCategory>()?,
                    cd_value,
                    cd_category: cd_category.parse::<CdCategory>()?,
                };
                Ok(StoredSample { id, sample, result })
            })
            .collect()
    }

    /// Stored alert configuration, or `defaults` when none has been saved
    pub fn alert_config(&self, defaults: &AlertConfig) -> Result<AlertConfig> {
        let row = self
            .conn
            .query_row(
                "SELECT hpi_threshold, cd_threshold, email_recipients, sms_recipients, policy_json
                 FROM alert_configs ORDER BY id ASC LIMIT 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, f64>(0)?,
                        r.get::<_, f64>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((hpi_threshold, cd_threshold, emails, sms, policy)) = row else {
            return Ok(defaults.clone());
        };

        Ok(AlertConfig {
            hpi_threshold,
            cd_threshold,
            email_recipients: parse_recipients(&emails),
            sms_recipients: parse_recipients(&sms),
            policy_json: serde_json::from_str(&policy)
                .context("stored alert policy is not valid JSON")?,
        })
    }

    /// Validate and replace the alert configuration
    pub fn save_alert_config(&self, config: &AlertConfig) -> Result<()> {
        config.validate()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO alert_configs
                (id, hpi_threshold, cd_threshold, email_recipients, sms_recipients, policy_json)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                config.hpi_threshold,
                config.cd_threshold,
                config.email_recipients.join(","),
                config.sms_recipients.join(","),
                serde_json::to_string(&config.policy_json)?,
            ],
        )?;
        tracing::info!(
            hpi_threshold = config.hpi_threshold,
            cd_threshold = config.cd_threshold,
            "saved alert configuration"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::calculate_indices;
    use tempfile::TempDir;

    fn assessed(lat: f64, c: Concentrations) -> AssessedSample {
        let sample = Sample::new(lat, 77.1, c);
        AssessedSample {
            sample,
            result: calculate_indices(&sample),
        }
    }

    #[test]
    fn test_insert_and_list_preserve_order() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = vec![
            assessed(1.0, Concentrations::complete(15.0, 4.0, 12.0, 5500.0)),
            assessed(2.0, Concentrations::new(None, Some(1.0), None, None)),
            assessed(3.0, Concentrations::default()),
        ];
        let stored = store.insert_assessed(&batch).unwrap();
        assert_eq!(stored.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let listed = store.list_samples().unwrap();
        assert_eq!(listed, stored);
        assert_eq!(listed[1].sample.concentrations.arsenic, None);
        assert_eq!(listed[2].result.hpi_category, HpiCategory::NoData);
    }

    #[test]
    fn test_batches_append() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_assessed(&[assessed(1.0, Concentrations::complete(1.0, 1.0, 1.0, 1.0))])
            .unwrap();
        let second = store
            .insert_assessed(&[assessed(2.0, Concentrations::complete(2.0, 2.0, 2.0, 2.0))])
            .unwrap();
        assert_eq!(second[0].id, 2);
        assert_eq!(store.list_samples().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_store() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.list_samples().unwrap().is_empty());
    }

    #[test]
    fn test_alert_config_defaults_then_saved() {
        let store = Store::open_in_memory().unwrap();
        let defaults = AlertConfig::default();
        assert_eq!(store.alert_config(&defaults).unwrap(), defaults);

        let config = AlertConfig {
            hpi_threshold: 120.0,
            cd_threshold: 2.5,
            email_recipients: vec!["ops@example.org".into(), "lab@example.org".into()],
            sms_recipients: vec!["+15550100".into()],
            policy_json: serde_json::json!({"delhi": {"hpi_threshold": 90}}),
        };
        store.save_alert_config(&config).unwrap();
        assert_eq!(store.alert_config(&defaults).unwrap(), config);

        // Saving again replaces the single row
        let updated = AlertConfig {
            hpi_threshold: 80.0,
            ..config
        };
        store.save_alert_config(&updated).unwrap();
        assert_eq!(store.alert_config(&defaults).unwrap().hpi_threshold, 80.0);
    }

    #[test]
    fn test_invalid_alert_config_is_not_saved() {
        let store = Store::open_in_memory().unwrap();
        let bad = AlertConfig {
            cd_threshold: -1.0,
            ..AlertConfig::default()
        };
        assert!(store.save_alert_config(&bad).is_err());
        assert_eq!(store.alert_config(&AlertConfig::default()).unwrap(), AlertConfig::default());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("data").join("water_quality.db");
        {
            let mut store = Store::open(&path).unwrap();
            store
                .insert_assessed(&[assessed(1.0, Concentrations::complete(1.0, 1.0, 1.0, 1.0))])
                .unwrap();
        }
        assert!(path.exists());

        // Reopening runs migrations again without losing data
        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_samples().unwrap().len(), 1);
    }
}
