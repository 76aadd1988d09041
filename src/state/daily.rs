//! Daily character selection.
//!
//! `get_or_rotate` is the only writer of the daily state. The whole
//! read-check-draw-persist sequence runs under one mutex, so callers racing
//! over a day boundary all get the same character.

use super::AppState;
use crate::catalog::CharacterCatalog;
use crate::error::{GameError, GameResult};
use crate::store::{DocumentStore, StoreError, GAME_STATE_DOC};
use crate::types::{Character, CharacterId, Mode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The character chosen for a mode and the day it was chosen on
#[derive(Debug, Clone, PartialEq)]
pub struct DailySelection {
    pub character: Character,
    pub selected_on: NaiveDate,
}

/// On-disk record for one mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DailyRecord {
    #[serde(rename = "char")]
    character: Option<CharacterId>,
    last_update: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct DailyState {
    selections: BTreeMap<Mode, DailySelection>,
}

impl DailyState {
    /// Rebuild from the `game_state` document, resolving ids against the catalog
    pub async fn load(store: &dyn DocumentStore, catalog: &CharacterCatalog) -> GameResult<Self> {
        let Some(doc) = store.load(GAME_STATE_DOC).await? else {
            return Ok(Self::default());
        };

        let records: BTreeMap<Mode, DailyRecord> = serde_json::from_value(doc)
            .map_err(|e| GameError::Configuration(format!("Corrupt daily state: {}", e)))?;

        let mut selections = BTreeMap::new();
        for (mode, record) in records {
            // A half-written record counts as "never rotated"
            let (Some(id), Some(selected_on)) = (record.character, record.last_update) else {
                continue;
            };
            let character = catalog.find(&id).cloned().ok_or_else(|| {
                GameError::Configuration(format!(
                    "Daily state for {} references unknown character '{}'",
                    mode, id
                ))
            })?;
            selections.insert(
                mode,
                DailySelection {
                    character,
                    selected_on,
                },
            );
        }

        Ok(Self { selections })
    }

    pub fn get(&self, mode: Mode) -> Option<&DailySelection> {
        self.selections.get(&mode)
    }

    /// The selection for `mode` if it is still valid on `today`. A selection
    /// dated after `today` (clock went backwards) stays valid, keeping the
    /// date non-decreasing.
    fn current(&self, mode: Mode, today: NaiveDate) -> Option<&DailySelection> {
        self.selections
            .get(&mode)
            .filter(|selection| selection.selected_on >= today)
    }

    fn to_document(&self) -> Result<serde_json::Value, StoreError> {
        let records: BTreeMap<Mode, DailyRecord> = Mode::ALL
            .iter()
            .map(|mode| {
                let record = self
                    .selections
                    .get(mode)
                    .map(|s| DailyRecord {
                        character: Some(s.character.name.clone()),
                        last_update: Some(s.selected_on),
                    })
                    .unwrap_or_default();
                (*mode, record)
            })
            .collect();
        Ok(serde_json::to_value(records)?)
    }
}

impl AppState {
    /// Today's character for `mode`, drawing and persisting a new one if the
    /// stored selection is from an earlier day.
    ///
    /// A rotation clears the comment history. The cleared history is written
    /// before the new selection, so a selection on disk never sits next to
    /// the previous day's chat. If either write fails the rotation fails,
    /// the previous selection stays in effect and the next call retries.
    pub async fn get_or_rotate(&self, mode: Mode) -> GameResult<DailySelection> {
        let today = self.clock.today();
        let mut daily = self.daily.lock().await;

        if let Some(selection) = daily.current(mode, today) {
            return Ok(selection.clone());
        }

        let drawn = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            self.catalog.random(&mut *rng)?.clone()
        };
        let selection = DailySelection {
            character: drawn,
            selected_on: today,
        };

        let mut next = daily.clone();
        next.selections.insert(mode, selection.clone());
        let doc = next.to_document()?;

        // Chat lives for one daily cycle, whatever mode triggered the rotation
        if let Err(e) = self.comments.clear().await {
            tracing::error!(mode = %mode, "Rotation aborted, comment history not cleared: {}", e);
            return Err(e);
        }
        if let Err(e) = self.store.save(GAME_STATE_DOC, &doc).await {
            tracing::error!(mode = %mode, "Rotation aborted, daily state not saved: {}", e);
            return Err(e.into());
        }
        *daily = next;

        tracing::info!(
            mode = %mode,
            date = %today,
            character = %selection.character.name,
            "Daily character rotated"
        );

        Ok(selection)
    }

    /// Current selection without rotating
    pub async fn peek_daily(&self, mode: Mode) -> Option<DailySelection> {
        self.daily.lock().await.get(mode).cloned()
    }
}
