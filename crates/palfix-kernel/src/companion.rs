//! Per-player companion documents (`Players/<UID>.sav`).

use palfix_tree::{
    CodecError, Document, DocumentCodec, SaveFormat, read_document_from_path,
    write_document_to_path,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uuid::Uuid;

pub const PLAYERS_DIR: &str = "Players";

/// `<UID upper-cased, dashes removed>.sav`
pub fn companion_file_name(player_uid: Uuid) -> String {
    format!("{:X}.sav", player_uid.simple())
}

/// Where companion documents are read from and written to.
pub trait CompanionStore {
    /// Location reported in diagnostics for `player_uid`.
    fn path_for(&self, player_uid: Uuid) -> PathBuf;

    /// `Ok(None)` when the companion does not exist.
    fn load(&self, player_uid: Uuid) -> Result<Option<Document>, CodecError>;

    fn save(&mut self, player_uid: Uuid, document: &Document) -> Result<(), CodecError>;
}

/// Companion files next to the world save.
pub struct DirCompanionStore {
    players_dir: PathBuf,
    codec: Box<dyn DocumentCodec>,
}

impl DirCompanionStore {
    pub fn new(world_dir: impl AsRef<Path>, codec: Box<dyn DocumentCodec>) -> Self {
        Self {
            players_dir: world_dir.as_ref().join(PLAYERS_DIR),
            codec,
        }
    }
}

impl CompanionStore for DirCompanionStore {
    fn path_for(&self, player_uid: Uuid) -> PathBuf {
        self.players_dir.join(companion_file_name(player_uid))
    }

    fn load(&self, player_uid: Uuid) -> Result<Option<Document>, CodecError> {
        let path = self.path_for(player_uid);
        if !path.is_file() {
            return Ok(None);
        }
        read_document_from_path(&path, self.codec.as_ref()).map(Some)
    }

    fn save(&mut self, player_uid: Uuid, document: &Document) -> Result<(), CodecError> {
        let path = self.path_for(player_uid);
        write_document_to_path(
            &path,
            document,
            SaveFormat::for_document(document),
            self.codec.as_ref(),
        )
    }
}

/// In-memory store. Clones share state so tests can inspect what a
/// session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryCompanionStore {
    documents: Rc<RefCell<BTreeMap<Uuid, Document>>>,
}

impl MemoryCompanionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, player_uid: Uuid, document: Document) {
        self.documents.borrow_mut().insert(player_uid, document);
    }

    pub fn get(&self, player_uid: Uuid) -> Option<Document> {
        self.documents.borrow().get(&player_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }
}

impl CompanionStore for MemoryCompanionStore {
    fn path_for(&self, player_uid: Uuid) -> PathBuf {
        Path::new(PLAYERS_DIR).join(companion_file_name(player_uid))
    }

    fn load(&self, player_uid: Uuid) -> Result<Option<Document>, CodecError> {
        Ok(self.get(player_uid))
    }

    fn save(&mut self, player_uid: Uuid, document: &Document) -> Result<(), CodecError> {
        self.insert(player_uid, document.clone());
        Ok(())
    }
}

/// Store that loads from a `MemoryCompanionStore` and refuses every write.
#[cfg(test)]
pub(crate) struct ReadOnlyCompanionStore(pub MemoryCompanionStore);

#[cfg(test)]
impl CompanionStore for ReadOnlyCompanionStore {
    fn path_for(&self, player_uid: Uuid) -> PathBuf {
        self.0.path_for(player_uid)
    }

    fn load(&self, player_uid: Uuid) -> Result<Option<Document>, CodecError> {
        self.0.load(player_uid)
    }

    fn save(&mut self, player_uid: Uuid, _document: &Document) -> Result<(), CodecError> {
        Err(CodecError::Io(format!("{} is read-only", self.path_for(player_uid).display())))
    }
}
