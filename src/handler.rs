use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_exchange().await;
        }
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await?,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    // Handle diet picker if it's open
    if app.show_diet_picker {
        match key.code {
            KeyCode::Esc => {
                app.show_diet_picker = false;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.diet_picker_nav_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.diet_picker_nav_up();
            }
            KeyCode::Enter => {
                app.select_diet();
            }
            _ => {}
        }
        return Ok(());
    }

    // Handle prompt picker if it's open
    if app.show_prompt_picker {
        match key.code {
            KeyCode::Esc => {
                app.show_prompt_picker = false;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.prompt_picker_nav_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.prompt_picker_nav_up();
            }
            KeyCode::Enter => {
                app.select_prompt();
            }
            _ => {}
        }
        return Ok(());
    }

    // Handle model list popup if it's open
    if app.show_models_popup {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                app.show_models_popup = false;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.models_nav_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.models_nav_up();
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Tab cycles focus: Input -> Chat -> Analysis -> Input
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Analysis,
                FocusPane::Analysis => FocusPane::Input,
            };

            // Auto-enter editing mode when focusing input
            if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
                // Cursor at end of existing text
                app.input_cursor = app.input.chars().count();
            }
        }

        // Jump straight into the input line
        KeyCode::Char('i') | KeyCode::Enter => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        // Scroll the focused pane
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Chat | FocusPane::Input => {
                app.chat_scroll = app.chat_scroll.saturating_add(1)
            }
            FocusPane::Analysis => {
                app.analysis_scroll = app.analysis_scroll.saturating_add(1)
            }
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Chat | FocusPane::Input => {
                app.chat_scroll = app.chat_scroll.saturating_sub(1)
            }
            FocusPane::Analysis => {
                app.analysis_scroll = app.analysis_scroll.saturating_sub(1)
            }
        },
        KeyCode::Char('g') => match app.focus {
            FocusPane::Chat | FocusPane::Input => app.chat_scroll = 0,
            FocusPane::Analysis => app.analysis_scroll = 0,
        },
        KeyCode::Char('G') => {
            if app.focus != FocusPane::Analysis {
                app.scroll_chat_to_bottom();
            }
        }

        // Open diet picker
        KeyCode::Char('d') => {
            app.open_diet_picker();
        }

        // Open prompt picker (fetches the list from the backend)
        KeyCode::Char('P') => {
            let prompts = app.client.list_prompts().await.unwrap_or_default();
            if !prompts.is_empty() {
                let current_idx = prompts
                    .iter()
                    .position(|p| p == &app.prompt_filename)
                    .unwrap_or(0);
                app.available_prompts = prompts;
                app.prompt_picker_state.select(Some(current_idx));
                app.show_prompt_picker = true;
            }
        }

        // Show the backend's model list
        KeyCode::Char('M') => {
            let models = app.client.list_models().await.unwrap_or_default();
            if !models.is_empty() {
                app.available_models = models;
                app.models_state.select(Some(0));
                app.show_models_popup = true;
            }
        }

        _ => {}
    }
    Ok(())
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if !app.input.trim().is_empty() && !app.loading {
                app.send_message();
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}
