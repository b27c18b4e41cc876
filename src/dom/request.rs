use std::rc::Rc;

use tracing::debug;

use crate::host::{invoke, HostBridge, HostCall};

use super::error::DomError;

/// Synchronous-only `XMLHttpRequest`.
///
/// The host performs the request inside `send`, so the response is available
/// as soon as `send` returns.
pub struct XmlHttpRequest {
    host: Rc<dyn HostBridge>,
    opened: Option<(String, String)>,
    response: Option<String>,
}

impl XmlHttpRequest {
    pub fn new(host: Rc<dyn HostBridge>) -> Self {
        Self {
            host,
            opened: None,
            response: None,
        }
    }

    /// Rejects asynchronous requests before anything reaches the host.
    pub fn open(&mut self, method: &str, url: &str, asynchronous: bool) -> Result<(), DomError> {
        if asynchronous {
            return Err(DomError::NotSupported {
                feature: "asynchronous XMLHttpRequest",
            });
        }
        self.opened = Some((method.to_ascii_uppercase(), url.to_string()));
        self.response = None;
        Ok(())
    }

    pub fn send(&mut self, body: Option<&str>) -> Result<&str, DomError> {
        let Some((method, url)) = self.opened.clone() else {
            return Err(DomError::InvalidState("send() before open()".into()));
        };
        debug!(target: "gal::dispatch", %method, %url, "xhr send");
        let text = invoke(
            self.host.as_ref(),
            HostCall::XhrSend {
                method,
                url,
                body: body.map(str::to_string),
            },
        )?
        .text()?;
        Ok(self.response.insert(text).as_str())
    }

    /// Body of the last completed request.
    pub fn response_text(&self) -> Option<&str> {
        self.response.as_deref()
    }
}
