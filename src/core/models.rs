use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: u32,
    pub given_name: String,
    pub family_name: String,
    pub start_date: NaiveDate,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
}

impl Person {
    pub fn new(
        id: u32,
        given_name: &str,
        family_name: &str,
        start_date: NaiveDate,
        rating: u8,
    ) -> Self {
        Self {
            id,
            given_name: given_name.to_string(),
            family_name: family_name.to_string(),
            start_date,
            rating,
            format_string: None,
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.format_string {
            // {0} is the given name, {1} the family name
            Some(template) => write!(
                f,
                "{}",
                template
                    .replace("{0}", &self.given_name)
                    .replace("{1}", &self.family_name)
            ),
            None => write!(f, "{} {}", self.given_name, self.family_name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataPath {
    pub root: PathBuf,
}

impl DataPath {
    pub fn new(data_path: Option<PathBuf>) -> io::Result<Self> {
        let root = match data_path {
            Some(path) => path,
            None => dirs::home_dir()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        "Home directory not found. Please specify --data-path.",
                    )
                })?
                .join(".peoplefetch"),
        };

        Ok(Self { root })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Relative people files are resolved against the data directory
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Checks the fields a roster entry must carry before it is handed to callers.
pub fn validate_person(person: &Person) -> Result<(), String> {
    if person.given_name.trim().is_empty() {
        return Err(format!("person {} has an empty given name", person.id));
    }

    if person.family_name.trim().is_empty() {
        return Err(format!("person {} has an empty family name", person.id));
    }

    if person.rating > 10 {
        return Err(format!(
            "person {} has rating {} (expected 0-10)",
            person.id, person.rating
        ));
    }

    Ok(())
}
