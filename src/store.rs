//! Record persistence.
//!
//! Rendering only ever sees an [`InspectionRecord`]; where records live is the
//! caller's business.  [`JsonDirStore`] keeps one pretty-printed JSON file per
//! serial, which is enough for the CLI and for tests.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::record::{ArtifactLinks, InspectionRecord, SerialNumber};

/// Errors raised by a record store.
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing a record file failed.
    Io { path: PathBuf, source: io::Error },
    /// A record file holds invalid JSON.
    Json { path: PathBuf, source: serde_json::Error },
    /// No record exists for the serial.
    NotFound(SerialNumber),
    /// A record with the serial already exists; records are immutable once created.
    AlreadyExists(SerialNumber),
    /// The record carries no serial to store it under.
    MissingSerial,
    /// The serial cannot be used as a file name inside the store.
    InvalidSerial(SerialNumber),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            Self::Json { path, source } => {
                write!(f, "Invalid record JSON in {}: {}", path.display(), source)
            }
            Self::NotFound(serial) => write!(f, "No record with serial {serial}"),
            Self::AlreadyExists(serial) => write!(f, "A record with serial {serial} already exists"),
            Self::MissingSerial => f.write_str("Record has no serial number"),
            Self::InvalidSerial(serial) => write!(f, "Serial {serial:?} is not a valid record name"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Keyed access to inspection records.
pub trait RecordStore {
    /// Loads the record stored under `serial`.
    fn get(&self, serial: &SerialNumber) -> Result<InspectionRecord, StoreError>;

    /// Creates a new record.  Fails if the serial is already taken.
    fn put(&self, record: &InspectionRecord) -> Result<(), StoreError>;

    /// Records where the rendered artifacts were published.
    ///
    /// Only the links that are `Some` are updated; every other field is left
    /// untouched.
    fn attach_artifacts(
        &self,
        serial: &SerialNumber,
        links: &ArtifactLinks,
    ) -> Result<InspectionRecord, StoreError>;
}

/// Stores each record as `<serial>.json` inside a directory.
#[derive(Clone, Debug)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Opens (and creates, if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, serial: &SerialNumber) -> Result<PathBuf, StoreError> {
        let name = serial.as_str();
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        if !valid {
            return Err(StoreError::InvalidSerial(serial.clone()));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    fn write(&self, path: &Path, record: &InspectionRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(record).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RecordStore for JsonDirStore {
    fn get(&self, serial: &SerialNumber) -> Result<InspectionRecord, StoreError> {
        let path = self.path_for(serial)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(serial.clone()))
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Json { path, source })
    }

    fn put(&self, record: &InspectionRecord) -> Result<(), StoreError> {
        let serial = record.serial.as_ref().ok_or(StoreError::MissingSerial)?;
        let path = self.path_for(serial)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists(serial.clone()));
        }
        self.write(&path, record)?;
        debug!("Stored record {} at {}", serial, path.display());
        Ok(())
    }

    fn attach_artifacts(
        &self,
        serial: &SerialNumber,
        links: &ArtifactLinks,
    ) -> Result<InspectionRecord, StoreError> {
        let mut record = self.get(serial)?;
        if let Some(pdf_url) = &links.pdf_url {
            record.artifacts.pdf_url = Some(pdf_url.clone());
        }
        if let Some(qr_url) = &links.qr_url {
            record.artifacts.qr_url = Some(qr_url.clone());
        }
        self.write(&self.path_for(serial)?, &record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: &str) -> InspectionRecord {
        InspectionRecord {
            serial: Some(SerialNumber::new(serial)),
            product_type: Some("RF".to_owned()),
            inspector: Some("QC001".to_owned()),
            ..InspectionRecord::default()
        }
    }

    #[test]
    fn put_then_get_returns_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path().join("records")).unwrap();
        let original = record("SAS20250124_093005");

        store.put(&original).unwrap();
        let loaded = store
            .get(&SerialNumber::new("SAS20250124_093005"))
            .unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn existing_serial_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        store.put(&record("SAS1")).unwrap();

        let mut changed = record("SAS1");
        changed.inspector = Some("QC999".to_owned());
        let err = store.put(&changed).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let kept = store.get(&SerialNumber::new("SAS1")).unwrap();
        assert_eq!(kept.inspector.as_deref(), Some("QC001"));
    }

    #[test]
    fn missing_serial_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get(&SerialNumber::new("SAS404")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.put(&InspectionRecord::default()),
            Err(StoreError::MissingSerial)
        ));
    }

    #[test]
    fn serials_cannot_escape_the_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path().join("records")).unwrap();
        fs::write(dir.path().join("outside.json"), "{}").unwrap();

        for serial in ["../outside", "nested/SAS1", "..", ".hidden", "", "a\\b"] {
            let serial = SerialNumber::new(serial);
            assert!(matches!(
                store.get(&serial),
                Err(StoreError::InvalidSerial(_))
            ));
            assert!(matches!(
                store.attach_artifacts(&serial, &ArtifactLinks::default()),
                Err(StoreError::InvalidSerial(_))
            ));
        }
        assert!(matches!(
            store.put(&record("../outside")),
            Err(StoreError::InvalidSerial(_))
        ));
        assert_eq!(
            fs::read_to_string(dir.path().join("outside.json")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn attaching_artifacts_only_touches_given_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        let serial = SerialNumber::new("SAS2");
        store.put(&record("SAS2")).unwrap();

        store
            .attach_artifacts(
                &serial,
                &ArtifactLinks {
                    pdf_url: Some("https://files.example/SAS2.pdf".to_owned()),
                    qr_url: None,
                },
            )
            .unwrap();
        let updated = store
            .attach_artifacts(
                &serial,
                &ArtifactLinks {
                    pdf_url: None,
                    qr_url: Some("https://files.example/SAS2.png".to_owned()),
                },
            )
            .unwrap();

        assert_eq!(
            updated.artifacts.pdf_url.as_deref(),
            Some("https://files.example/SAS2.pdf")
        );
        assert_eq!(
            updated.artifacts.qr_url.as_deref(),
            Some("https://files.example/SAS2.png")
        );
        assert_eq!(updated.inspector.as_deref(), Some("QC001"));
        assert_eq!(store.get(&serial).unwrap(), updated);
    }
}
