use std::io::{self, Write};

use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use yiamas::transcript::{Sender, TranscriptEntry};

use super::prompt::{Input, InputType, Prompt};
use crate::render::to_terminal;

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
    input_mode: InputMode,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            busy: false,
            input_mode: InputMode::Singleline,
        }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn print_newline() {
    println!();
}

fn flush() {
    if let Err(e) = io::stdout().flush() {
        tracing::warn!("Failed to flush stdout: {}", e);
    }
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, entry: &TranscriptEntry) {
        match entry.sender {
            Sender::Bot => println!("{}", style("Yia Mas Bot").bold().cyan()),
            Sender::User => println!("{}", style("You").bold()),
        }
        println!("{}", to_terminal(&entry.content));

        print_newline();
        flush();
    }

    fn render_fragment(&mut self, fragment: &str) {
        print!("{}", fragment);
        flush();
    }

    fn end_fragments(&mut self) {
        print_newline();
        print_newline();
        flush();
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("Yiayia is looking...");
        self.busy = true;
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("Yia Mas:         [Help: /?]").placeholder("");
        match self.input_mode {
            InputMode::Multiline => input = input.multiline(),
            InputMode::Singleline => (),
        }
        let message_text: String = input.interact()?;
        let message_text = message_text.trim().to_string();

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            Ok(Input {
                input_type: InputType::Exit,
                content: None,
            })
        } else if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
            self.get_input()
        } else if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
            self.get_input()
        } else if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("/exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/? - Display this help message");
            self.get_input()
        } else if message_text.is_empty() {
            Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            })
        } else {
            Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text),
            })
        }
    }

    fn close(&self) {
        println!("{}", style("Opa! Come back hungry.").dim());
    }
}
