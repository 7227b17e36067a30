use anyhow::Result;
use futures::StreamExt;

use crate::prompt::prompt::{InputType, Prompt};
use yiamas::adapter::ConversationAdapter;
use yiamas::errors::ChatError;
use yiamas::models::reply::Reply;
use yiamas::transcript::Transcript;

/// Drives one conversation: reads input, locks it while a reply is pending,
/// and renders each transcript entry as it is appended.
pub struct ChatLoop<'a> {
    adapter: ConversationAdapter,
    prompt: Box<dyn Prompt + 'a>,
    transcript: Transcript,
}

impl<'a> ChatLoop<'a> {
    pub fn new(adapter: ConversationAdapter, prompt: Box<dyn Prompt + 'a>) -> Self {
        let transcript = Transcript::with_welcome(adapter.mode().body_format());
        ChatLoop {
            adapter,
            prompt,
            transcript,
        }
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.yiamas_ready();
        if let Some(welcome) = self.transcript.last() {
            self.prompt.render(welcome);
        }

        loop {
            let input = self.prompt.get_input()?;
            let text = match input.input_type {
                InputType::Message => match input.content {
                    Some(content) if !content.trim().is_empty() => content,
                    _ => continue,
                },
                InputType::Exit => break,
                InputType::AskAgain => continue,
            };

            self.transcript.push_user(&text);
            self.prompt.show_busy();
            self.exchange(&text).await;
            self.prompt.hide_busy();
        }

        self.prompt.close();
        Ok(())
    }

    async fn exchange(&mut self, text: &str) {
        match self.adapter.send(text).await {
            Ok(Reply::Complete(reply)) => {
                self.prompt.hide_busy();
                let entry = self.transcript.push_reply(&reply);
                self.prompt.render(entry);
            }
            Ok(Reply::Stream(mut stream)) => {
                self.transcript.begin_stream();
                let mut failed = false;

                while let Some(fragment) = stream.next().await {
                    match fragment {
                        Ok(fragment) => {
                            self.prompt.hide_busy();
                            self.transcript.push_fragment(&fragment);
                            self.prompt.render_fragment(&fragment);
                        }
                        Err(e) => {
                            tracing::error!("Reply stream failed: {}", e);
                            failed = true;
                            break;
                        }
                    }
                }
                drop(stream);

                self.transcript.end_stream();
                self.prompt.hide_busy();
                self.prompt.end_fragments();
                if failed {
                    let entry = self.transcript.push_fallback();
                    self.prompt.render(entry);
                }
            }
            Err(ChatError::EmptyInput) => {}
            Err(e) => {
                tracing::error!("Message failed: {}", e);
                self.prompt.hide_busy();
                let entry = self.transcript.push_fallback();
                self.prompt.render(entry);
            }
        }
    }
}
