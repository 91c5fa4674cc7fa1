//! `WorldSession`: one loaded world and everything operations need.
//!
//! The session owns the live document, its index, the optional backup
//! document used as a migration source, the companion store, the id source,
//! and the event log. Every operation is a method on it; nothing is global.

use crate::companion::{CompanionStore, DirCompanionStore};
use crate::error::SessionError;
use crate::events::{Event, EventKind, EventLog};
use crate::ids::{IdSource, RandomIds};
use crate::index::{EntityIndex, PlayerMeta};
use crate::schema::{self, CHARACTER_MAP, CharacterView};
use palfix_tree::{
    Document, DocumentCodec, JsonCodec, SaveFormat, SectionFootprint, Value,
    read_document_from_path, section_footprint, write_document_to_path,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Directory holding the world save and its `Players/` folder.
    pub world_dir: PathBuf,
}

impl SessionOptions {
    pub fn for_input(input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let world_dir = input_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            output_path: default_output_path(&input_path),
            input_path,
            world_dir,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }
}

/// `Level.sav` → `Level_fixed.sav`.
pub fn default_output_path(input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input_path.extension() {
        Some(extension) => format!("{stem}_fixed.{}", extension.to_string_lossy()),
        None => format!("{stem}_fixed"),
    };
    input_path.with_file_name(name)
}

pub struct WorldSession {
    pub(crate) document: Document,
    pub(crate) index: EntityIndex,
    pub(crate) source: Option<Document>,
    pub(crate) options: SessionOptions,
    pub(crate) codec: Box<dyn DocumentCodec>,
    pub(crate) companions: Box<dyn CompanionStore>,
    pub(crate) ids: Box<dyn IdSource>,
    pub(crate) events: EventLog,
}

impl WorldSession {
    /// Wrap an already decoded world. Fails with a structural mismatch when
    /// a required collection is absent.
    pub fn new(document: Document, options: SessionOptions) -> Result<Self, SessionError> {
        schema::validate_world(&document)?;
        let index = EntityIndex::build(&document)?;
        let companions = DirCompanionStore::new(&options.world_dir, Box::new(JsonCodec::default()));
        Ok(Self {
            document,
            index,
            source: None,
            options,
            codec: Box::new(JsonCodec::default()),
            companions: Box::new(companions),
            ids: Box::new(RandomIds),
            events: EventLog::new(),
        })
    }

    /// Read `options.input_path` with `codec`; companion files are read and
    /// written with the same codec.
    pub fn open<C>(options: SessionOptions, codec: C) -> Result<Self, SessionError>
    where
        C: DocumentCodec + Clone + 'static,
    {
        let document = read_document_from_path(&options.input_path, &codec)?;
        log::info!("loaded {}", options.input_path.display());
        let companions = DirCompanionStore::new(&options.world_dir, Box::new(codec.clone()));
        Ok(Self::new(document, options)?
            .with_codec(Box::new(codec))
            .with_companions(Box::new(companions)))
    }

    pub fn with_codec(mut self, codec: Box<dyn DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_companions(mut self, companions: Box<dyn CompanionStore>) -> Self {
        self.companions = companions;
        self
    }

    pub fn with_ids(mut self, ids: Box<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for edits outside the session operations. Call
    /// `reindex` afterwards.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    pub fn source(&self) -> Option<&Document> {
        self.source.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Hand accumulated events to the presentation layer.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn reindex(&mut self) -> Result<(), SessionError> {
        self.index = EntityIndex::build(&self.document)?;
        Ok(())
    }

    /// One `PlayerListed` event per player row, in collection order.
    pub fn show_players(&mut self) -> Vec<PlayerMeta> {
        let players: Vec<PlayerMeta> = self.index.players().into_iter().cloned().collect();
        for player in &players {
            self.events.push(
                Event::new(EventKind::PlayerListed, player.player_uid)
                    .attr("instance", player.instance_id)
                    .attr("level", player.level)
                    .attr("nickname", &player.nickname),
            );
        }
        players
    }

    /// The parameter subtree of `player_uid`'s row, if the player exists.
    pub fn inspect_player(&self, player_uid: Uuid) -> Result<Option<Value>, SessionError> {
        let Some(meta) = self.index.player(&player_uid) else {
            return Ok(None);
        };
        let Some(character) = self.index.instance(&meta.instance_id) else {
            return Ok(None);
        };
        let entries = schema::collection(&self.document, CHARACTER_MAP)?;
        let Some(entry) = entries.get(character.position) else {
            return Ok(None);
        };
        Ok(Some(CharacterView::read(entry)?.parameter.clone()))
    }

    pub fn statistics(&self) -> Result<Vec<SectionFootprint>, SessionError> {
        Ok(section_footprint(&self.document)?)
    }

    /// Load a backup world to migrate players from.
    pub fn open_source(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let document = read_document_from_path(path, self.codec.as_ref())?;
        self.set_source(document, &path.display().to_string())
    }

    pub fn set_source(&mut self, document: Document, label: &str) -> Result<(), SessionError> {
        schema::validate_world(&document)?;
        let players = EntityIndex::build(&document)?.player_count();
        self.source = Some(document);
        self.events.push(
            Event::new(EventKind::BackupOpened, label).attr("players", players),
        );
        Ok(())
    }

    /// Write the live document to the configured output path.
    pub fn save(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.options.output_path.clone();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let format = SaveFormat::for_document(&self.document);
        write_document_to_path(path, &self.document, format, self.codec.as_ref())?;
        self.events.push(
            Event::new(EventKind::DocumentSaved, path.display())
                .attr("saveType", format!("0x{:02x}", format.magic())),
        );
        Ok(())
    }
}
