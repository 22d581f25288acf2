// Cross-tab move/copy of a single item with its cue and custom name.
// Pure logic over the registry and the active session - no Tauri imports.

use serde::{Deserialize, Serialize};

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::session::ActiveSession;
use crate::modules::tabs::TabRegistry;
use crate::state::is_valid_cue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub path: String,
    pub source: String,
    pub target: String,
    pub is_copy: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The target already listed the path, so no new card was added there.
    pub target_already_had: bool,
    /// At least one occurrence left the source tab.
    pub removed_from_source: bool,
}

pub fn transfer(
    registry: &mut TabRegistry,
    session: &mut ActiveSession,
    request: &TransferRequest,
) -> SoundboardResult<TransferOutcome> {
    let TransferRequest {
        path,
        source,
        target,
        is_copy,
    } = request;

    for id in [source, target] {
        if !registry.contains(id) {
            return Err(SoundboardError::InvalidTransfer(format!("unknown tab '{}'", id)));
        }
    }
    if source == target && !is_copy {
        return Err(SoundboardError::InvalidTransfer(
            "source and target are the same tab".to_string(),
        ));
    }

    // The working copy may be ahead of the registry.
    let session_involved = session.tab_id() == source || session.tab_id() == target;
    if session_involved {
        session.flush(registry);
    }

    let mut source_state = registry.get_state(source);
    if !source_state.contains(path) {
        return Err(SoundboardError::InvalidTransfer(format!(
            "'{}' is not in the source tab",
            path
        )));
    }

    let cue = source_state.cue_positions.get(path).copied().filter(|c| is_valid_cue(*c));
    let name = source_state
        .custom_names
        .get(path)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut outcome = TransferOutcome::default();

    if source == target {
        // Copy onto itself: the path is already there, nothing to duplicate.
        outcome.target_already_had = true;
        return Ok(outcome);
    }

    let mut target_state = registry.get_state(target);
    outcome.target_already_had = target_state.contains(path);
    if !outcome.target_already_had {
        target_state.files.push(path.clone());
    }
    if let Some(cue) = cue {
        target_state.cue_positions.insert(path.clone(), cue);
    }
    if let Some(name) = name {
        target_state.custom_names.insert(path.clone(), name);
    }

    if !is_copy {
        outcome.removed_from_source = source_state.remove_all(path);
    }

    registry.put_state(source, source_state);
    registry.put_state(target, target_state);
    registry.persist_states();

    if session_involved {
        let state = registry.get_state(session.tab_id());
        session.refresh_from(state);
    }

    log::info!(
        "[Transfer] {} '{}' from {} to {}",
        if *is_copy { "Copied" } else { "Moved" },
        path,
        source,
        target
    );
    Ok(outcome)
}
