//! Per-device interpreter session: mode, context, history, completion.

use log::debug;

use crate::device::{DeviceId, DeviceStore};

use super::tree::{self, Completion};
use super::CliMode;

/// Result of a tab-completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    /// The (possibly rewritten) input line.
    pub input: String,
    /// Lines to print when candidates were listed; empty otherwise.
    pub output: Vec<String>,
}

/// One open CLI window bound to a device.
///
/// All interpreter state is local to the session, so several sessions can
/// target the same device concurrently; the device configuration itself
/// lives only in the store.
#[derive(Debug)]
pub struct CliSession {
    pub(crate) device_id: DeviceId,
    pub(crate) mode: CliMode,
    /// Submitted lines, most recent first.
    pub(crate) history: Vec<String>,
    pub(crate) history_index: Option<usize>,
    pub(crate) current_interface: Option<String>,
    pub(crate) current_vlan: Option<u16>,
    pub(crate) current_ospf: Option<String>,
    pub(crate) current_acl: Option<u32>,
    pub(crate) current_bgp: Option<String>,
}

impl CliSession {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            mode: CliMode::Exec,
            history: Vec::new(),
            history_index: None,
            current_interface: None,
            current_vlan: None,
            current_ospf: None,
            current_acl: None,
            current_bgp: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn mode(&self) -> CliMode {
        self.mode
    }

    /// The prompt for the current mode, e.g. `SW-1(config-if)# `.
    pub fn prompt(&self, store: &DeviceStore) -> String {
        let hostname = store
            .device(&self.device_id)
            .map(|device| {
                device
                    .config
                    .hostname
                    .clone()
                    .unwrap_or_else(|| device.label.clone())
            })
            .unwrap_or_else(|| "Device".to_string());
        format!("{}{} ", hostname, self.mode.prompt_suffix())
    }

    /// Submits one input line.
    ///
    /// Returns the terminal lines this produced: the echoed prompt+command
    /// first, then at most one diagnostic or command output. Empty input
    /// produces nothing and is not recorded in history; everything else is,
    /// even when it yielded an error line.
    pub fn submit_line(&mut self, store: &mut DeviceStore, line: &str) -> Vec<String> {
        let command = line.trim();
        if command.is_empty() {
            return Vec::new();
        }

        let mut lines = vec![format!("{}{}", self.prompt(store), command)];
        if let Some(output) = self.execute(store, command) {
            debug!("{} -> {}", command, output.lines().next().unwrap_or(""));
            lines.push(output);
        }

        self.history.insert(0, command.to_string());
        self.history_index = None;
        lines
    }

    /// Attempts tab-completion of `input` against the current mode's trie.
    pub fn complete_input(&self, store: &DeviceStore, input: &str) -> CompletionResult {
        match tree::complete(tree::tree_for_mode(self.mode), input) {
            Completion::None => CompletionResult {
                input: input.to_string(),
                output: Vec::new(),
            },
            Completion::Extend(extended) => CompletionResult {
                input: extended,
                output: Vec::new(),
            },
            Completion::Candidates(candidates) => CompletionResult {
                input: input.to_string(),
                output: vec![
                    format!("{}{}", self.prompt(store), input),
                    candidates.join("  "),
                ],
            },
        }
    }

    /// Moves back in history (arrow-up); `None` when already at the oldest
    /// entry or the history is empty, meaning the input stays as it is.
    pub fn history_prev(&mut self) -> Option<String> {
        let next_index = match self.history_index {
            None => 0,
            Some(index) => index + 1,
        };
        if next_index >= self.history.len() {
            return None;
        }
        self.history_index = Some(next_index);
        Some(self.history[next_index].clone())
    }

    /// Moves forward in history (arrow-down); moving below the newest entry
    /// clears the input. `None` leaves the input untouched.
    pub fn history_next(&mut self) -> Option<String> {
        match self.history_index {
            Some(index) if index > 0 => {
                self.history_index = Some(index - 1);
                Some(self.history[index - 1].clone())
            }
            Some(_) => {
                self.history_index = None;
                Some(String::new())
            }
            None => Some(String::new()),
        }
    }
}
