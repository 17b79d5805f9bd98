//! Transport doubles for controller and autocomplete tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use baso_core::error::TransportError;
use baso_core::prompt::AssembledRequest;
use baso_core::transport::{FragmentReceiver, FragmentSender, Transport, fragment_channel};
use tokio::sync::mpsc;

type Script = (Vec<String>, Option<TransportError>);

/// Replays scripted responses, one per call. The last script repeats.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    refusal: Option<TransportError>,
    requests: Mutex<Vec<AssembledRequest>>,
}

impl ScriptedTransport {
    /// Every call yields `fragments` and completes.
    pub fn replying<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::sequence(vec![(
            fragments.into_iter().map(Into::into).collect(),
            None,
        )])
    }

    /// One script per call, in order.
    pub fn sequence(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            refusal: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails before any stream exists.
    pub fn refusing(error: TransportError) -> Self {
        Self {
            refusal: Some(error),
            ..Self::sequence(vec![])
        }
    }

    /// Raise `error` after the scripted fragments.
    pub fn then_fail(self, error: TransportError) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            for script in scripts.iter_mut() {
                script.1 = Some(error.clone());
            }
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<AssembledRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: AssembledRequest) -> Result<FragmentReceiver, TransportError> {
        self.requests.lock().unwrap().push(request);
        if let Some(error) = &self.refusal {
            return Err(error.clone());
        }

        let (fragments, error) = self.next_script();
        let (tx, rx) = fragment_channel(fragments.len() + 1);
        for fragment in fragments {
            tx.send(Ok(fragment)).await.unwrap();
        }
        if let Some(error) = error {
            tx.send(Err(error)).await.unwrap();
        }
        Ok(rx)
    }
}

/// Hands each call's sender to the test, which feeds fragments by hand.
pub struct GatedTransport {
    opened: mpsc::UnboundedSender<FragmentSender>,
}

pub struct GateFeed {
    opened: mpsc::UnboundedReceiver<FragmentSender>,
}

impl GatedTransport {
    pub fn new() -> (Self, GateFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { opened: tx }, GateFeed { opened: rx })
    }
}

impl GateFeed {
    /// Wait for the next `stream` call and take its sender.
    pub async fn opened(&mut self) -> FragmentSender {
        self.opened.recv().await.unwrap()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    fn name(&self) -> &str {
        "gated"
    }

    async fn stream(&self, _request: AssembledRequest) -> Result<FragmentReceiver, TransportError> {
        let (tx, rx) = fragment_channel(16);
        self.opened
            .send(tx)
            .map_err(|_| TransportError::NotConfigured("gate closed".into()))?;
        Ok(rx)
    }
}
