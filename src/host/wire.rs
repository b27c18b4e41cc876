use serde_json::{from_str, to_string};

use super::{BridgeError, HostBridge, HostCall, HostReply};

/// Bridge to a host in another process, speaking JSON over an arbitrary
/// request/response transport.
pub struct JsonBridge<T> {
    transport: T,
}

impl<T> JsonBridge<T>
where
    T: Fn(&str) -> Result<String, BridgeError>,
{
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T> HostBridge for JsonBridge<T>
where
    T: Fn(&str) -> Result<String, BridgeError>,
{
    fn invoke(&self, call: HostCall) -> Result<HostReply, BridgeError> {
        let op = call.name();
        let request = to_string(&call)?;
        let response = (self.transport)(&request)?;
        let reply: Result<HostReply, String> = from_str(&response)?;
        reply.map_err(|message| BridgeError::Host { op, message })
    }
}

/// Host-side half of [`JsonBridge`]: decode one request, run it against a
/// local bridge and encode the outcome.
pub fn serve_json(host: &dyn HostBridge, request: &str) -> Result<String, BridgeError> {
    let call: HostCall = from_str(request)?;
    let outcome = host.invoke(call).map_err(|err| match err {
        BridgeError::Host { message, .. } => message,
        other => other.to_string(),
    });
    Ok(to_string(&outcome)?)
}
