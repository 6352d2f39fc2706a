/// What a password prompt is guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose<'a> {
    /// Opening the launcher itself.
    AppOpen,
    /// Launching one protected application.
    Launch { key: &'a str },
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    pub purpose: PromptPurpose<'a>,
    /// Whether a "remember this device" choice should be offered.
    pub offer_remember_device: bool,
    /// Starts at 1 and grows with every rejected password.
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    Submitted {
        password: String,
        remember_device: bool,
    },
    Cancelled,
}

/// The user-facing side of a password check, supplied by the shell.
pub trait PasswordPrompt {
    fn request(&mut self, request: &PromptRequest<'_>) -> PromptResponse;

    /// Called after a wrong password, before the next request.
    fn rejected(&mut self, _request: &PromptRequest<'_>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allowed,
    Cancelled,
}

impl GateOutcome {
    pub fn is_allowed(self) -> bool {
        matches!(self, GateOutcome::Allowed)
    }
}

/// Asks until `verify` accepts a password or the prompt is cancelled.
/// Returns whether the user asked to remember this device.
pub(crate) fn prompt_until_verified<P, V>(
    prompt: &mut P,
    purpose: PromptPurpose<'_>,
    offer_remember_device: bool,
    verify: V,
) -> Option<bool>
where
    P: PasswordPrompt + ?Sized,
    V: Fn(&str) -> bool,
{
    let mut attempt = 1;
    loop {
        let request = PromptRequest {
            purpose,
            offer_remember_device,
            attempt,
        };
        match prompt.request(&request) {
            PromptResponse::Cancelled => return None,
            PromptResponse::Submitted {
                password,
                remember_device,
            } => {
                if verify(&password) {
                    return Some(offer_remember_device && remember_device);
                }
                tracing::debug!(attempt, "password rejected");
                prompt.rejected(&request);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Replays scripted responses and records what it was asked.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompt {
        pub responses: Vec<PromptResponse>,
        pub requests: Vec<(u32, bool)>,
        pub rejections: u32,
    }

    impl ScriptedPrompt {
        pub fn new(responses: Vec<PromptResponse>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses,
                ..Self::default()
            }
        }
    }

    pub fn submit(password: &str, remember_device: bool) -> PromptResponse {
        PromptResponse::Submitted {
            password: password.into(),
            remember_device,
        }
    }

    impl PasswordPrompt for ScriptedPrompt {
        fn request(&mut self, request: &PromptRequest<'_>) -> PromptResponse {
            self.requests
                .push((request.attempt, request.offer_remember_device));
            self.responses.pop().unwrap_or(PromptResponse::Cancelled)
        }

        fn rejected(&mut self, _request: &PromptRequest<'_>) {
            self.rejections += 1;
        }
    }
}
