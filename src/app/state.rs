//! Application state definitions

use crate::exercise::blanks::BlankPosition;
use crate::lab::model::BlockKey;

/// Which screen is currently displayed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Lab,
    Help,
}

/// State for the code view
#[derive(Debug, Clone, Default)]
pub struct CodeViewState {
    /// Index of the code block being shown within the current step
    pub active_block: usize,
    /// Current scroll position (lines from top)
    pub scroll_offset: usize,
    /// Total lines in the displayed code (updated on render)
    pub total_lines: usize,
    /// Visible height in lines (updated on render)
    pub visible_height: usize,
    /// Show the read-only preview with revealed answers filled in
    pub show_answers: bool,
    /// Index into the current blank list
    pub selected_blank: Option<usize>,
    /// Hint popover open for the selected blank
    pub popover_open: bool,
}

impl CodeViewState {
    /// Get the maximum allowed scroll offset
    pub fn max_scroll(&self) -> usize {
        self.total_lines.saturating_sub(self.visible_height)
    }

    /// Clamp scroll offset to valid range
    pub fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll_offset = self.scroll_offset.saturating_add_signed(delta);
        self.clamp_scroll();
    }

    /// Forget per-step view state after moving to another step
    pub fn reset_for_step(&mut self) {
        *self = Self { visible_height: self.visible_height, ..Self::default() };
    }

    /// Move the blank selection, wrapping at either end
    pub fn cycle_blank(&mut self, count: usize, forward: bool) {
        if count == 0 {
            self.selected_blank = None;
            self.popover_open = false;
            return;
        }
        self.selected_blank = Some(match (self.selected_blank, forward) {
            (None, true) => 0,
            (None, false) => count - 1,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        });
    }

    /// Selected blank resolved against the current positions
    pub fn selected<'a>(&self, positions: &'a [BlankPosition]) -> Option<&'a BlankPosition> {
        self.selected_blank.and_then(|i| positions.get(i))
    }

    /// Scroll so a 1-indexed line is on screen
    pub fn ensure_line_visible(&mut self, line: usize) {
        let idx = line.saturating_sub(1);
        if idx < self.scroll_offset {
            self.scroll_offset = idx;
        } else if self.visible_height > 0 && idx >= self.scroll_offset + self.visible_height {
            self.scroll_offset = idx + 1 - self.visible_height;
        }
    }
}

/// Command line mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandMode {
    /// Command line shows status
    #[default]
    Normal,
    /// Accepting : commands
    Command,
}

/// State for the command line input
#[derive(Debug, Clone, Default)]
pub struct CommandLineState {
    /// Current mode
    pub mode: CommandMode,
    /// Input buffer
    pub input: String,
    /// Cursor position in input, in characters
    pub cursor: usize,
    /// Status/error message to display (when not in input mode)
    pub message: Option<String>,
    /// Whether message is an error
    pub is_error: bool,
    /// Command history
    pub history: Vec<String>,
    /// Current history index when navigating
    pub history_index: Option<usize>,
}

impl CommandLineState {
    /// Maximum number of history entries to keep
    const MAX_HISTORY: usize = 100;

    /// Start command mode
    pub fn enter_command_mode(&mut self) {
        self.mode = CommandMode::Command;
        self.input.clear();
        self.cursor = 0;
        self.message = None;
        self.history_index = None;
    }

    /// Exit input mode
    pub fn exit_input_mode(&mut self) {
        self.mode = CommandMode::Normal;
        self.input.clear();
        self.cursor = 0;
    }

    /// Set a status message
    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.is_error = false;
    }

    /// Set an error message
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.is_error = true;
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.input.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(self.input.len())
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at cursor
    pub fn insert_char(&mut self, c: char) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
    }

    /// Delete character before cursor
    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_idx = self.char_to_byte_index(self.cursor);
            self.input.remove(byte_idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_count() {
            self.cursor += 1;
        }
    }

    pub fn is_input_mode(&self) -> bool {
        self.mode == CommandMode::Command
    }

    /// Add to history
    pub fn add_to_history(&mut self, cmd: String) {
        if !cmd.is_empty() && self.history.last() != Some(&cmd) {
            if self.history.len() >= Self::MAX_HISTORY {
                self.history.remove(0);
            }
            self.history.push(cmd);
        }
    }

    /// Navigate history up
    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => self.history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.history_index = Some(index);
        self.input = self.history[index].clone();
        self.cursor = self.char_count();
    }

    /// Navigate history down
    pub fn history_down(&mut self) {
        let Some(i) = self.history_index else {
            return;
        };
        if i + 1 < self.history.len() {
            self.history_index = Some(i + 1);
            self.input = self.history[i + 1].clone();
        } else {
            self.history_index = None;
            self.input.clear();
        }
        self.cursor = self.char_count();
    }
}

/// Full application state
#[derive(Debug, Default)]
pub struct AppState {
    /// Current screen
    pub screen: Screen,

    /// Code view state
    pub code_view: CodeViewState,

    /// Command line state
    pub command_line: CommandLineState,
}

impl AppState {
    /// Key of the block shown for a step
    pub fn active_block_key(&self, step: usize) -> BlockKey {
        BlockKey::new(step, self.code_view.active_block)
    }
}
