//! Bindings for driving a replay from JavaScript.

use samba::{JumpOutcome, Progress, ReplaySession, SecurityOptions, Step, Trace};
use wasm_bindgen::{prelude::wasm_bindgen, JsValue};

use crate::{Error, SambaClient, TraceParameters};

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, Error> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::JsonError(e.to_string()))
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, Error> {
    serde_wasm_bindgen::to_value(value).map_err(|e| Error::JsonError(e.to_string()))
}

/// A replay session owned by JavaScript.
#[wasm_bindgen]
#[derive(Debug)]
pub struct Replay {
    session: ReplaySession,
}

#[wasm_bindgen]
impl Replay {
    /// Validates a trace object and starts a replay at its beginning.
    #[wasm_bindgen(constructor)]
    pub fn new(trace: JsValue) -> Result<Replay, Error> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let trace: Trace = from_js(trace)?;
        Ok(Replay {
            session: ReplaySession::new(trace)?,
        })
    }

    /// Moves one step forward, returning `false` at the end of the replay.
    pub fn advance(&mut self) -> Result<bool, Error> {
        Ok(self.session.advance()? == Progress::Moved)
    }

    /// Moves one step backward, returning `false` at the beginning of the replay.
    pub fn retreat(&mut self) -> Result<bool, Error> {
        Ok(self.session.retreat()? == Progress::Moved)
    }

    /// Jumps to the turn typed by the user, returning `false` if the input was ignored.
    #[wasm_bindgen(js_name = jumpTo)]
    pub fn jump_to(&mut self, input: &str) -> Result<bool, Error> {
        let outcome = self.session.jump_to(input)?;
        Ok(matches!(outcome, JumpOutcome::Moved { .. }))
    }

    /// Skips to the aggregation of the cumulative reward.
    #[wasm_bindgen(js_name = jumpToCumulativeRewardPhase)]
    pub fn jump_to_cumulative_reward_phase(&mut self) -> Result<(), Error> {
        Ok(self.session.jump_to_cumulative_reward_phase()?)
    }

    /// Rewinds to the beginning.
    #[wasm_bindgen(js_name = initializeForPresentation)]
    pub fn initialize_for_presentation(&mut self) {
        self.session.initialize_for_presentation()
    }

    /// The current position, narration and per-arm display.
    pub fn snapshot(&self) -> Result<JsValue, Error> {
        to_js(&self.session.snapshot())
    }

    /// The tokens of the message sent at `step` (2 to 7), seen from `focused_arm`.
    ///
    /// `options` is an object with the boolean fields `aes`, `paillier`, `mask` and `permutation`.
    pub fn message(
        &self,
        step: u8,
        focused_arm: usize,
        secure: bool,
        options: JsValue,
    ) -> Result<JsValue, Error> {
        let step = Step::from_number(step)
            .ok_or_else(|| Error::JsonError(format!("{step} is not a protocol step")))?;
        let options: SecurityOptions = from_js(options)?;
        let message = self
            .session
            .render_message(step, focused_arm, secure, options)?;
        to_js(&message.tokens)
    }

    /// The estimated unsecure and secure times for every budget up to the trace's budget.
    #[wasm_bindgen(js_name = timeCurve)]
    pub fn time_curve(&self, options: JsValue) -> Result<JsValue, Error> {
        let options: SecurityOptions = from_js(options)?;
        to_js(&self.session.estimator().curve(options))
    }
}

/// Fetches a trace from the server at `url`.
#[wasm_bindgen(js_name = createTrace)]
pub async fn create_trace(url: String, parameters: JsValue) -> Result<JsValue, Error> {
    let parameters: TraceParameters = from_js(parameters)?;
    let trace = SambaClient::parse(&url)?.create_trace(&parameters).await?;
    to_js(&trace)
}

/// Lists the traces stored on the server at `url`.
#[wasm_bindgen]
pub async fn history(url: String) -> Result<JsValue, Error> {
    let history = SambaClient::parse(&url)?.history().await?;
    to_js(&history)
}

/// Deletes a trace from the history of the server at `url`.
#[wasm_bindgen(js_name = deleteHistory)]
pub async fn delete_history(url: String, id: String) -> Result<(), Error> {
    SambaClient::parse(&url)?.delete_history(&id).await
}
