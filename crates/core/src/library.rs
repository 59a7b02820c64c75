//! User-managed library of saved streams.
//!
//! Independent of the per-player table in [`store`](crate::store): the
//! library is a list the user curates (add, edit, remove) and picks from to
//! replace what the active player streams. It persists over its own
//! [`KvBackend`] with the layout
//!
//! ```text
//! entriesSize = N
//! uri0 / name0 / user0 / pass0
//! ...
//! ```
//!
//! A backend holding no entries yields the two built-in cameras.

use crate::config::{DEFAULT_MEDIA_PASS, DEFAULT_MEDIA_URI, DEFAULT_MEDIA_USER, PlayerConfiguration};
use crate::error::{Result, ViewerError};
use crate::store::KvBackend;
use crate::viewer::Viewer;

const KEY_SIZE: &str = "entriesSize";

/// Tunnelled camera seeded as the second built-in entry.
pub const HTTP_CAMERA_URI: &str = "rtsph://94.190.242.153/axis-media/media.amp";

/// Entries offered when nothing has been saved yet.
pub fn builtin_entries() -> Vec<PlayerConfiguration> {
    [DEFAULT_MEDIA_URI, HTTP_CAMERA_URI]
        .iter()
        .enumerate()
        .map(|(i, uri)| {
            PlayerConfiguration::new(uri)
                .with_credentials(DEFAULT_MEDIA_USER, DEFAULT_MEDIA_PASS)
                .with_name(&format!("Camera {i}"))
        })
        .collect()
}

pub struct StreamLibrary {
    backend: Box<dyn KvBackend>,
    entries: Vec<PlayerConfiguration>,
}

impl StreamLibrary {
    /// Load the library from `backend`.
    ///
    /// Rows whose URI is missing or unacceptable are skipped.
    pub fn open(backend: Box<dyn KvBackend>) -> Self {
        let size = backend.get_int(KEY_SIZE).unwrap_or(0).max(0) as usize;
        let entries = if size == 0 {
            builtin_entries()
        } else {
            (0..size)
                .filter_map(|i| {
                    let column = |name: &str| backend.get_string(&format!("{name}{i}"));
                    let config = PlayerConfiguration {
                        uri: column("uri")?,
                        user: column("user").unwrap_or_default(),
                        pass: column("pass").unwrap_or_default(),
                        name: column("name").unwrap_or_default(),
                    };
                    match config.validate() {
                        Ok(_) => Some(config),
                        Err(e) => {
                            tracing::warn!(entry = i, error = %e, "library entry skipped");
                            None
                        }
                    }
                })
                .collect()
        };
        tracing::debug!(stored = size, entries = entries.len(), "stream library loaded");
        Self { backend, entries }
    }

    pub fn entries(&self) -> &[PlayerConfiguration] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&PlayerConfiguration> {
        self.entries.get(index).ok_or(ViewerError::NoSuchEntry(index))
    }

    /// Append an entry, returning its index.
    pub fn add(&mut self, config: PlayerConfiguration) -> Result<usize> {
        config.validate()?;
        self.entries.push(config);
        Ok(self.entries.len() - 1)
    }

    /// Replace the entry at `index`. A rejected URI leaves it unchanged.
    pub fn edit(&mut self, index: usize, config: PlayerConfiguration) -> Result<()> {
        config.validate()?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(ViewerError::NoSuchEntry(index))?;
        *entry = config;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<PlayerConfiguration> {
        if index >= self.entries.len() {
            return Err(ViewerError::NoSuchEntry(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Stream entry `index` on whichever player is active when the viewer
    /// processes the request.
    pub fn apply(&self, index: usize, viewer: &Viewer) -> Result<()> {
        viewer.configure_active(self.get(index)?.clone())
    }

    /// Rewrite the whole list and commit once.
    pub fn save(&mut self) -> Result<()> {
        self.backend.put_int(KEY_SIZE, self.entries.len() as i64);
        for (i, entry) in self.entries.iter().enumerate() {
            self.backend.put_string(&format!("uri{i}"), &entry.uri);
            self.backend.put_string(&format!("name{i}"), &entry.name);
            self.backend.put_string(&format!("user{i}"), &entry.user);
            self.backend.put_string(&format!("pass{i}"), &entry.pass);
        }
        self.backend.commit()?;
        tracing::debug!(entries = self.entries.len(), "stream library saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    #[test]
    fn empty_backend_offers_builtin_cameras() {
        let library = StreamLibrary::open(Box::new(MemoryBackend::new()));
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(0).unwrap().name, "Camera 0");
        assert_eq!(library.get(0).unwrap().uri, DEFAULT_MEDIA_URI);
        assert_eq!(library.get(1).unwrap().uri, HTTP_CAMERA_URI);
        assert_eq!(library.get(1).unwrap().user, "root");
    }

    #[test]
    fn edits_survive_reopen() {
        let backend = MemoryBackend::new();
        let mut library = StreamLibrary::open(Box::new(backend.clone()));
        library.remove(0).unwrap();
        library
            .edit(0, PlayerConfiguration::new("rtspt://10.0.0.5/live").with_name("Dock"))
            .unwrap();
        let added = library
            .add(PlayerConfiguration::new("rtsp://10.0.0.6/a").with_credentials("admin", ""))
            .unwrap();
        assert_eq!(added, 1);
        library.save().unwrap();
        assert_eq!(backend.get_int("entriesSize"), Some(2));

        let reopened = StreamLibrary::open(Box::new(backend));
        assert_eq!(reopened.entries(), library.entries());
        assert_eq!(reopened.get(0).unwrap().name, "Dock");
        assert_eq!(reopened.get(1).unwrap().pass, "");
    }

    #[test]
    fn invalid_uri_is_refused() {
        let mut library = StreamLibrary::open(Box::new(MemoryBackend::new()));
        assert!(matches!(
            library.add(PlayerConfiguration::new("http://cam/a")),
            Err(ViewerError::InvalidUri { .. })
        ));
        assert!(library.edit(1, PlayerConfiguration::new("rtsph://")).is_err());
        assert_eq!(library.get(1).unwrap().uri, HTTP_CAMERA_URI);
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn out_of_range_index() {
        let mut library = StreamLibrary::open(Box::new(MemoryBackend::new()));
        assert!(matches!(library.get(5), Err(ViewerError::NoSuchEntry(5))));
        assert!(matches!(library.remove(2), Err(ViewerError::NoSuchEntry(2))));
        assert!(matches!(
            library.edit(9, PlayerConfiguration::new("rtsp://a/b")),
            Err(ViewerError::NoSuchEntry(9))
        ));
    }

    #[test]
    fn emptied_library_falls_back_to_builtins() {
        let backend = MemoryBackend::new();
        let mut library = StreamLibrary::open(Box::new(backend.clone()));
        library.remove(1).unwrap();
        library.remove(0).unwrap();
        assert!(library.is_empty());
        library.save().unwrap();

        assert_eq!(StreamLibrary::open(Box::new(backend)).len(), 2);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let mut backend = MemoryBackend::new();
        backend.put_int("entriesSize", 3);
        backend.put_string("uri0", "rtsp://a/1");
        backend.put_string("uri1", "ftp://b/2");
        backend.put_string("uri2", "rtsph://c/3");
        backend.put_string("name2", "C");
        let library = StreamLibrary::open(Box::new(backend));
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(1).unwrap().name, "C");
    }
}
