use ratatui::widgets::ListState;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::analysis::Analysis;
use crate::client::{ChatReply, NutriClient, DEFAULT_PROMPT_FILENAME};
use crate::config::Config;
use crate::diet::Diet;

/// Fallback assistant message shown for any failed exchange. The underlying
/// error goes to the log, never to the conversation.
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Analysis,
    Input,
}

/// A chat message in the conversation. Serialized as-is into the request
/// `history`, so the role names match what the backend expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation state
    pub chat_messages: Vec<ChatMessage>,
    pub diet: Diet,
    pub analysis: Option<Analysis>,

    // Pending input
    pub input: String,
    pub input_cursor: usize, // char position, not byte position

    // Exchange state
    pub loading: bool,
    exchange_task: Option<tokio::task::JoinHandle<anyhow::Result<ChatReply>>>,

    // Presentation state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub analysis_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Diet picker state
    pub show_diet_picker: bool,
    pub diet_picker_state: ListState,

    // Prompt picker state
    pub show_prompt_picker: bool,
    pub available_prompts: Vec<String>,
    pub prompt_picker_state: ListState,
    pub prompt_filename: String,

    // Backend model list popup (informational)
    pub show_models_popup: bool,
    pub available_models: Vec<String>,
    pub models_state: ListState,

    // Backend client
    pub client: NutriClient,
}

impl App {
    pub fn new(config: Config) -> Self {
        let client = NutriClient::new(&config.resolve_api_url());

        let diet = config
            .default_diet
            .as_deref()
            .and_then(Diet::from_str)
            .unwrap_or(Diet::Scd);

        let prompt_filename = config
            .prompt_filename
            .unwrap_or_else(|| DEFAULT_PROMPT_FILENAME.to_string());

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Input,

            chat_messages: Vec::new(),
            diet,
            analysis: None,

            input: String::new(),
            input_cursor: 0,

            loading: false,
            exchange_task: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            analysis_scroll: 0,

            animation_frame: 0,

            show_diet_picker: false,
            diet_picker_state: ListState::default(),

            show_prompt_picker: false,
            available_prompts: Vec::new(),
            prompt_picker_state: ListState::default(),
            prompt_filename,

            show_models_popup: false,
            available_models: Vec::new(),
            models_state: ListState::default(),

            client,
        }
    }

    /// Start one exchange with the backend.
    ///
    /// No-op when the trimmed input is empty or a request is already in
    /// flight. Otherwise the user message is appended immediately, the input
    /// and previous analysis are cleared, and the network call runs on a
    /// background task until `complete_exchange` applies its outcome.
    pub fn send_message(&mut self) {
        let trimmed = self.input.trim();
        if trimmed.is_empty() || self.loading {
            return;
        }

        let user_message = trimmed.to_string();
        // The request history is the conversation before this message.
        let history = self.chat_messages.clone();

        self.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: user_message.clone(),
        });
        self.input.clear();
        self.input_cursor = 0;
        self.analysis = None;
        self.loading = true;
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let diet = self.diet;
        let prompt_filename = self.prompt_filename.clone();
        self.exchange_task = Some(tokio::spawn(async move {
            client
                .chat(diet.as_str(), &prompt_filename, &history, &user_message)
                .await
        }));
    }

    pub fn exchange_pending(&self) -> bool {
        self.exchange_task.is_some()
    }

    /// Apply a finished exchange without blocking. Called from the event loop
    /// on every tick.
    pub async fn poll_exchange(&mut self) {
        let finished = self
            .exchange_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);

        if finished {
            self.complete_exchange().await;
        }
    }

    /// Await the outstanding exchange and apply its outcome: append the reply
    /// (or the fixed error message), parse the analysis block if one came
    /// back, and clear the in-flight flag last.
    pub async fn complete_exchange(&mut self) {
        let Some(task) = self.exchange_task.take() else {
            return;
        };

        let outcome = match task.await {
            Ok(result) => result,
            Err(join_error) => Err(anyhow::Error::from(join_error)),
        };

        match outcome {
            Ok(reply) => {
                self.chat_messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: reply.reply,
                });
                self.analysis = reply
                    .analysis
                    .as_deref()
                    .filter(|text| !text.is_empty())
                    .map(Analysis::parse);
            }
            Err(err) => {
                error!("chat exchange failed: {:#}", err);
                self.chat_messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: ERROR_REPLY.to_string(),
                });
            }
        }

        self.loading = false;
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat so the latest message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "Nutri-Chat:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.loading {
            total_lines += 2; // "Nutri-Chat:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    // Diet picker methods
    pub fn open_diet_picker(&mut self) {
        let current_idx = Diet::all()
            .iter()
            .position(|d| *d == self.diet)
            .unwrap_or(0);
        self.diet_picker_state.select(Some(current_idx));
        self.show_diet_picker = true;
    }

    pub fn diet_picker_nav_down(&mut self) {
        let len = Diet::all().len();
        if len > 0 {
            let i = self.diet_picker_state.selected().unwrap_or(0);
            self.diet_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn diet_picker_nav_up(&mut self) {
        let i = self.diet_picker_state.selected().unwrap_or(0);
        self.diet_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_diet(&mut self) {
        if let Some(i) = self.diet_picker_state.selected() {
            if let Some(&diet) = Diet::all().get(i) {
                self.diet = diet;
                self.show_diet_picker = false;
                // Save to config
                let _ = Config::save_default_diet(diet.as_str());
            }
        }
    }

    // Prompt picker methods
    pub fn prompt_picker_nav_down(&mut self) {
        let len = self.available_prompts.len();
        if len > 0 {
            let i = self.prompt_picker_state.selected().unwrap_or(0);
            self.prompt_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn prompt_picker_nav_up(&mut self) {
        let i = self.prompt_picker_state.selected().unwrap_or(0);
        self.prompt_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_prompt(&mut self) {
        if let Some(i) = self.prompt_picker_state.selected() {
            if let Some(prompt) = self.available_prompts.get(i) {
                self.prompt_filename = prompt.clone();
                self.show_prompt_picker = false;
                let _ = Config::save_prompt_filename(&self.prompt_filename);
            }
        }
    }

    // Model list popup navigation
    pub fn models_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.models_state.selected().unwrap_or(0);
            self.models_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn models_nav_up(&mut self) {
        let i = self.models_state.selected().unwrap_or(0);
        self.models_state.select(Some(i.saturating_sub(1)));
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // A request must not outlive the UI that issued it.
        if let Some(task) = self.exchange_task.take() {
            task.abort();
        }
    }
}
