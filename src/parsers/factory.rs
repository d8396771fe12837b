//! Builds parsers by source

use crate::parsers::common::ParserKind;
use crate::parsers::engine::{Parser, ParserSettings};
use crate::parsers::index_entry::IndexEntryParser;
use crate::parsers::linked_list::LinkedListParser;
use crate::parsers::sources::{Ao3Source, RoyalRoadSource, WordPressSource, XenForoSource};
use crate::parsers::ParserError;
use crate::versioning::VersionEngine;
use std::sync::Arc;

/// Creates fresh parsers wired to the shared version engine
pub struct ParserFactory {
    versioning: Option<Arc<VersionEngine>>,
    settings: ParserSettings,
}

impl ParserFactory {
    pub fn new(versioning: Option<Arc<VersionEngine>>, settings: ParserSettings) -> Self {
        Self {
            versioning,
            settings,
        }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Builds the parser for the source a URL belongs to
    pub fn parser_by_url(&self, url: &str) -> Result<Box<dyn Parser>, ParserError> {
        self.parser_by_kind(ParserKind::from_url(url))
    }

    /// Builds a parser for a source
    ///
    /// Sources without a parser, the error kind included, are reported as
    /// `UnsupportedSource`.
    pub fn parser_by_kind(&self, kind: ParserKind) -> Result<Box<dyn Parser>, ParserError> {
        let versioning = self.versioning.clone();
        let settings = self.settings.clone();

        let parser: Box<dyn Parser> = match kind {
            ParserKind::Ao3 => Box::new(IndexEntryParser::new(Ao3Source, versioning, settings)?),
            ParserKind::Rr => Box::new(IndexEntryParser::new(RoyalRoadSource, versioning, settings)?),
            ParserKind::Sbf => Box::new(LinkedListParser::new(
                XenForoSource::spacebattles(),
                versioning,
                settings,
            )?),
            ParserKind::Svf => Box::new(LinkedListParser::new(
                XenForoSource::sufficient_velocity(),
                versioning,
                settings,
            )?),
            ParserKind::Wp => Box::new(LinkedListParser::new(WordPressSource, versioning, settings)?),
            ParserKind::Ffn | ParserKind::Yt | ParserKind::Error => {
                return Err(ParserError::UnsupportedSource(kind))
            }
        };

        Ok(parser)
    }
}
