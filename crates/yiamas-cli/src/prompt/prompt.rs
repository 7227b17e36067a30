use anyhow::Result;
use yiamas::transcript::TranscriptEntry;

pub trait Prompt {
    fn render(&mut self, entry: &TranscriptEntry);
    /// Print one streamed fragment as it arrives
    fn render_fragment(&mut self, fragment: &str);
    fn end_fragments(&mut self) {}
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn yiamas_ready(&self) {
        println!("\n");
        println!("Yia Mas Bot is at the door! Ask for a table, or type /? for help.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}
