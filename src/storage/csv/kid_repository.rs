use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::kid::Kid;
use crate::storage::traits::KidStorage;

/// Intermediate struct for YAML serialization with string date fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct YamlKid {
    id: String,
    name: String,
    avatar: Option<String>,
    lifetime_points: i64,
    redeemed_points: i64,
    created_at: String,
    updated_at: String,
}

/// File-based kid repository using directory discovery: every subdirectory
/// of the data directory containing a `kid.yaml` is a kid.
#[derive(Clone)]
pub struct KidRepository {
    connection: Arc<CsvConnection>,
}

impl KidRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn kid_yaml_path(&self, directory_name: &str) -> PathBuf {
        self.connection.kid_directory(directory_name).join("kid.yaml")
    }

    /// Scan the data directory for kid directories.
    fn discover_kids(&self) -> Result<Vec<Kid>> {
        let base_dir = self.connection.base_directory();

        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut kids = Vec::new();

        for entry in fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let dir_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => {
                    warn!("Skipping directory with invalid name: {:?}", path);
                    continue;
                }
            };

            match self.load_kid_from_directory(dir_name) {
                Ok(Some(kid)) => kids.push(kid),
                Ok(None) => debug!("Directory {} has no kid.yaml", dir_name),
                Err(e) => warn!("Error loading kid from directory {}: {}", dir_name, e),
            }
        }

        kids.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(kids)
    }

    fn load_kid_from_directory(&self, directory_name: &str) -> Result<Option<Kid>> {
        let yaml_path = self.kid_yaml_path(directory_name);

        if !yaml_path.exists() {
            return Ok(None);
        }

        let yaml_content = fs::read_to_string(&yaml_path)?;
        let yaml_kid: YamlKid = serde_yaml::from_str(&yaml_content)?;

        let kid = Kid {
            id: yaml_kid.id,
            name: yaml_kid.name,
            avatar: yaml_kid.avatar,
            lifetime_points: yaml_kid.lifetime_points,
            redeemed_points: yaml_kid.redeemed_points,
            created_at: chrono::DateTime::parse_from_rfc3339(&yaml_kid.created_at)
                .map_err(|e| anyhow::anyhow!("Failed to parse created_at: {}", e))?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&yaml_kid.updated_at)
                .map_err(|e| anyhow::anyhow!("Failed to parse updated_at: {}", e))?
                .with_timezone(&chrono::Utc),
        };

        Ok(Some(kid))
    }

    fn save_kid_to_directory(&self, kid: &Kid, directory_name: &str) -> Result<()> {
        let yaml_kid = YamlKid {
            id: kid.id.clone(),
            name: kid.name.clone(),
            avatar: kid.avatar.clone(),
            lifetime_points: kid.lifetime_points,
            redeemed_points: kid.redeemed_points,
            created_at: kid.created_at.to_rfc3339(),
            updated_at: kid.updated_at.to_rfc3339(),
        };

        let yaml_content = serde_yaml::to_string(&yaml_kid)?;
        let yaml_path = self.kid_yaml_path(directory_name);
        self.connection
            .write_atomic(&yaml_path, yaml_content.as_bytes())?;

        debug!("Saved kid {} to directory {}", kid.name, directory_name);
        Ok(())
    }

    /// Find the directory holding a kid's files. Directories are named after
    /// the kid at creation time, so this resolves by id, not by name: the
    /// directory keeps its original name across renames.
    pub(crate) fn find_directory_by_kid_id(&self, kid_id: &str) -> Result<Option<String>> {
        let base_dir = self.connection.base_directory();
        if !base_dir.exists() {
            return Ok(None);
        }

        for entry in fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let dir_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if let Ok(Some(kid)) = self.load_kid_from_directory(&dir_name) {
                if kid.id == kid_id {
                    return Ok(Some(dir_name));
                }
            }
        }

        Ok(None)
    }
}

impl KidStorage for KidRepository {
    fn store_kid(&self, kid: &Kid) -> Result<()> {
        let mut dir_name = CsvConnection::safe_directory_name(&kid.name);
        if dir_name.is_empty() {
            dir_name = "kid".to_string();
        }
        // Suffix on collision so two kids with the same name can coexist.
        if self.kid_yaml_path(&dir_name).exists() {
            let suffix = kid.id.rsplit("::").next().unwrap_or("x");
            dir_name = format!("{}_{}", dir_name, &suffix[..suffix.len().min(8)]);
        }
        self.save_kid_to_directory(kid, &dir_name)
    }

    fn get_kid(&self, kid_id: &str) -> Result<Option<Kid>> {
        let kids = self.discover_kids()?;
        Ok(kids.into_iter().find(|k| k.id == kid_id))
    }

    fn list_kids(&self) -> Result<Vec<Kid>> {
        self.discover_kids()
    }

    fn update_kid(&self, kid: &Kid) -> Result<()> {
        match self.find_directory_by_kid_id(&kid.id)? {
            Some(dir_name) => self.save_kid_to_directory(kid, &dir_name),
            None => {
                warn!("Attempted to update a non-existent kid: {}", kid.id);
                Err(anyhow::anyhow!("Kid not found for update: {}", kid.id))
            }
        }
    }

    fn delete_kid(&self, kid_id: &str) -> Result<()> {
        if let Some(dir_name) = self.find_directory_by_kid_id(kid_id)? {
            let kid_dir = self.connection.kid_directory(&dir_name);
            if kid_dir.exists() {
                fs::remove_dir_all(&kid_dir)?;
                info!("Deleted kid directory: {:?}", kid_dir);
            }
        } else {
            warn!("Attempted to delete a non-existent kid: {}", kid_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (KidRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (KidRepository::new(Arc::new(connection)), temp_dir)
    }

    fn make_kid(name: &str) -> Kid {
        let now = chrono::Utc::now();
        Kid {
            id: Kid::generate_id(),
            name: name.to_string(),
            avatar: None,
            lifetime_points: 0,
            redeemed_points: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_store_and_discover_kid() {
        let (repo, _temp_dir) = setup_test_repo();
        let kid = make_kid("Emma");

        repo.store_kid(&kid).unwrap();

        let kids = repo.list_kids().unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].name, "Emma");
        assert_eq!(kids[0].id, kid.id);

        let found = repo.get_kid(&kid.id).unwrap();
        assert_eq!(found.unwrap().name, "Emma");
    }

    #[test]
    fn test_update_kid_preserves_directory() {
        let (repo, _temp_dir) = setup_test_repo();
        let mut kid = make_kid("Emma");
        repo.store_kid(&kid).unwrap();

        kid.name = "Emma Rose".to_string();
        kid.lifetime_points = 12;
        repo.update_kid(&kid).unwrap();

        let found = repo.get_kid(&kid.id).unwrap().unwrap();
        assert_eq!(found.name, "Emma Rose");
        assert_eq!(found.lifetime_points, 12);
        assert_eq!(repo.list_kids().unwrap().len(), 1);
    }

    #[test]
    fn test_update_nonexistent_kid_fails() {
        let (repo, _temp_dir) = setup_test_repo();
        let kid = make_kid("Ghost");
        assert!(repo.update_kid(&kid).is_err());
    }

    #[test]
    fn test_delete_kid_removes_directory() {
        let (repo, _temp_dir) = setup_test_repo();
        let kid = make_kid("Emma");
        repo.store_kid(&kid).unwrap();

        repo.delete_kid(&kid.id).unwrap();

        assert!(repo.get_kid(&kid.id).unwrap().is_none());
        assert!(repo.list_kids().unwrap().is_empty());
    }

    #[test]
    fn test_same_name_kids_do_not_collide() {
        let (repo, _temp_dir) = setup_test_repo();
        let a = make_kid("Emma");
        let b = make_kid("Emma");

        repo.store_kid(&a).unwrap();
        repo.store_kid(&b).unwrap();

        assert_eq!(repo.list_kids().unwrap().len(), 2);
        assert!(repo.get_kid(&a.id).unwrap().is_some());
        assert!(repo.get_kid(&b.id).unwrap().is_some());
    }
}
