//! Line-oriented login session
//!
//! Drives one [`FormState`] against one [`LoginController`] for as long as
//! the user keeps answering: a rejected password is asked for again, so
//! consecutive rejections count toward the lock the same way repeated
//! presses of a form's submit button would.

use std::io;

use latch_core::validation::Field;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::controller::LoginController;
use crate::form::FormState;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Signed in; navigate to the destination.
    SignedIn { destination: String },
    /// The gate is locked. Carries the "Time remaining" text.
    Locked { time_remaining: Option<String> },
    /// Input ran out before a sign in.
    EndOfInput,
}

pub struct LoginSession<'a, R, W> {
    controller: &'a LoginController,
    form: FormState,
    input: Lines<R>,
    output: W,
}

impl<'a, R, W> LoginSession<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Prompts and form messages go to `output`.
    pub fn new(controller: &'a LoginController, form: FormState, input: R, output: W) -> Self {
        Self {
            controller,
            form,
            input: input.lines(),
            output,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Submit until the gate answers with success or a lock, or input ends.
    /// `password` is used for the first submission instead of prompting.
    pub async fn run(&mut self, mut password: Option<String>) -> io::Result<SessionOutcome> {
        self.form.refresh(&self.controller.lockout_status().await);

        loop {
            let next = match password.take() {
                Some(password) => password,
                None => match self.prompt("Password: ").await? {
                    Some(password) => password,
                    None => return Ok(SessionOutcome::EndOfInput),
                },
            };
            self.form.set_password(next);

            self.form.begin_submit();
            let result = self.controller.submit(self.form.credentials()).await;
            if let Some(destination) = self.form.apply(&result) {
                return Ok(SessionOutcome::SignedIn { destination });
            }
            self.report().await?;

            if self.form.is_locked() {
                self.form.refresh(&self.controller.lockout_status().await);
                let time_remaining = self.form.time_remaining();
                if let Some(text) = &time_remaining {
                    self.line(text).await?;
                }
                return Ok(SessionOutcome::Locked { time_remaining });
            }

            if self.form.field_error(Field::Email).is_some() {
                match self.prompt("Email: ").await? {
                    Some(email) => self.form.set_email(email),
                    None => return Ok(SessionOutcome::EndOfInput),
                }
            }
        }
    }

    async fn report(&mut self) -> io::Result<()> {
        let mut messages = Vec::new();
        for field in [Field::Email, Field::Password] {
            if let Some(message) = self.form.field_error(field) {
                messages.push(format!("{field}: {message}"));
            }
        }
        if let Some(message) = self.form.general_error() {
            messages.push(message.to_string());
        }

        for message in messages {
            self.line(&message).await?;
        }
        Ok(())
    }

    async fn line(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        self.output.write_all(label.as_bytes()).await?;
        self.output.flush().await?;

        Ok(self
            .input
            .next_line()
            .await?
            .map(|line| line.trim_end_matches('\r').to_string()))
    }
}
