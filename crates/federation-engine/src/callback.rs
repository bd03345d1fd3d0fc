//! Callback parsing, CSRF verification, and the loopback listener.

use crate::{AuthError, AuthResult};
use portal_storage::{AuthMode, FlowStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use url::Url;

/// Default time to wait for the provider redirect.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 180;

/// Protocol parameters recovered from the provider redirect.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Recover parameters from a raw query string.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Recover parameters from a full callback URL.
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }

    /// Did the redirect carry any protocol parameters at all?
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.state.is_none() && self.error.is_none()
    }
}

/// A callback that passed CSRF verification.
#[derive(Debug, Clone)]
pub struct VerifiedCallback {
    /// Authorization code, ready for the exchange
    pub code: String,
    /// Mode recorded at redirect time
    pub mode: AuthMode,
}

/// Verify a provider callback against the persisted flow state.
///
/// The stored anti-forgery token and the recorded mode are consumed whatever
/// the outcome, so a refreshed/replayed callback can never re-verify. A
/// provider-reported error is terminal before any network call.
pub fn verify_callback(params: &CallbackParams, flow: &FlowStore) -> AuthResult<VerifiedCallback> {
    let stored_token = flow.take_state_token()?;
    let mode = flow.take_mode()?;

    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or("");
        info!(error, "Provider rejected the authorization request");
        return Err(AuthError::OAuthProtocol(format!(
            "provider returned {}: {}",
            error, description
        )));
    }

    let code = params
        .code
        .as_ref()
        .ok_or_else(|| AuthError::OAuthProtocol("callback carried no code".to_string()))?;
    let returned_state = params
        .state
        .as_ref()
        .ok_or_else(|| AuthError::OAuthProtocol("callback carried no state".to_string()))?;

    match stored_token {
        Some(token) if &token == returned_state => {}
        Some(_) => {
            return Err(AuthError::OAuthProtocol(
                "state does not match the persisted anti-forgery token".to_string(),
            ))
        }
        None => {
            return Err(AuthError::OAuthProtocol(
                "no anti-forgery token persisted for this flow".to_string(),
            ))
        }
    }

    Ok(VerifiedCallback {
        code: code.clone(),
        mode,
    })
}

/// Loopback HTTP listener that receives the provider redirect.
///
/// Accepts a single `GET /callback?...`, answers with a terminal HTML page,
/// and hands the parsed parameters back to the flow. The caller is
/// responsible for opening the browser to the authorization URL.
pub struct CallbackListener {
    port: u16,
    timeout_secs: u64,
}

impl CallbackListener {
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }

    pub fn with_default_timeout(port: u16) -> Self {
        Self::new(port, DEFAULT_CALLBACK_TIMEOUT_SECS)
    }

    /// The redirect URI this listener serves.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Bind the loopback port and wait for the provider redirect.
    ///
    /// Resolves with the parsed parameters from the first `/callback` hit,
    /// or an `OAuthProtocol` error on timeout.
    pub async fn wait_for_callback(&self) -> AuthResult<CallbackParams> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;

        info!(port = self.port, "Callback listener bound");

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let server_handle = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, tx).await {
                                    error!("Error handling callback connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let result = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(AuthError::OAuthProtocol(
                "callback channel closed".to_string(),
            )),
            Err(_) => Err(AuthError::OAuthProtocol(
                "timed out waiting for the provider redirect".to_string(),
            )),
        };

        server_handle.abort();
        result
    }
}

async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<CallbackParams>>>>,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received request");

    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    let query = match path.find('?') {
        Some(idx) => &path[idx + 1..],
        None => "",
    };
    let params = CallbackParams::from_query(query);

    if let Some(error) = &params.error {
        send_response(&mut writer, 200, "OK", &error_page(error)).await?;
    } else if params.code.is_some() {
        send_response(&mut writer, 200, "OK", &success_page()).await?;
    } else {
        send_response(&mut writer, 200, "OK", &error_page("missing parameters")).await?;
    }

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(params);
    }

    Ok(())
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Tidewatch - Signed In</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #0e7490; margin-bottom: 20px;">You're signed in</h1>
<p style="color: #666;">You can close this window and return to the portal.</p>
</div>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Tidewatch - Sign-In Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #ef4444; margin-bottom: 20px;">Sign-in failed</h1>
<p style="color: #666;">Error: {}</p>
<p style="color: #888; font-size: 14px;">You can close this window and try again.</p>
</div>
</body>
</html>"#,
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_storage::MemoryStore;

    fn flow_store() -> FlowStore {
        FlowStore::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_from_query_success_shape() {
        let params = CallbackParams::from_query("code=abc&state=tok123");
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("tok123"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_from_query_error_shape() {
        let params =
            CallbackParams::from_query("error=access_denied&error_description=User%20declined");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User declined"));
        assert!(params.code.is_none());
    }

    #[test]
    fn test_from_url_and_empty() {
        let url = Url::parse("http://localhost:8617/callback?code=abc&state=s").unwrap();
        let params = CallbackParams::from_url(&url);
        assert_eq!(params.code.as_deref(), Some("abc"));

        let bare = Url::parse("http://localhost:8617/callback").unwrap();
        assert!(CallbackParams::from_url(&bare).is_empty());
    }

    #[test]
    fn test_verify_happy_path() {
        let flow = flow_store();
        flow.stash_state_token("tok123").unwrap();
        flow.record_mode(AuthMode::SignUp).unwrap();

        let params = CallbackParams::from_query("code=abc&state=tok123");
        let verified = verify_callback(&params, &flow).unwrap();
        assert_eq!(verified.code, "abc");
        assert_eq!(verified.mode, AuthMode::SignUp);
    }

    #[test]
    fn test_verify_state_mismatch() {
        let flow = flow_store();
        flow.stash_state_token("tok123").unwrap();

        let params = CallbackParams::from_query("code=abc&state=evil");
        let err = verify_callback(&params, &flow).unwrap_err();
        assert!(matches!(err, AuthError::OAuthProtocol(_)));
    }

    #[test]
    fn test_verify_missing_token() {
        let flow = flow_store();
        let params = CallbackParams::from_query("code=abc&state=tok123");
        let err = verify_callback(&params, &flow).unwrap_err();
        assert!(matches!(err, AuthError::OAuthProtocol(_)));
    }

    #[test]
    fn test_verify_provider_error_is_terminal() {
        let flow = flow_store();
        flow.stash_state_token("tok123").unwrap();

        let params = CallbackParams::from_query("error=access_denied");
        let err = verify_callback(&params, &flow).unwrap_err();
        assert!(matches!(err, AuthError::OAuthProtocol(_)));

        // Token was consumed even on the error path
        assert_eq!(flow.take_state_token().unwrap(), None);
    }

    #[test]
    fn test_verify_consumes_token() {
        let flow = flow_store();
        flow.stash_state_token("tok123").unwrap();
        flow.record_mode(AuthMode::SignIn).unwrap();

        let params = CallbackParams::from_query("code=abc&state=tok123");
        verify_callback(&params, &flow).unwrap();

        // A replayed callback cannot re-verify
        let err = verify_callback(&params, &flow).unwrap_err();
        assert!(matches!(err, AuthError::OAuthProtocol(_)));
    }

    #[tokio::test]
    async fn test_listener_receives_callback() {
        // Port picked from the ephemeral range to avoid collisions between tests
        let listener = CallbackListener::new(18617, 5);
        let uri = format!("{}?code=abc&state=tok", listener.redirect_uri());

        let wait = tokio::spawn(async move { listener.wait_for_callback().await });

        // Give the listener a moment to bind
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let body = reqwest::get(&uri).await.unwrap().text().await.unwrap();
        assert!(body.contains("signed in"));

        let params = wait.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_listener_times_out() {
        let listener = CallbackListener::new(18618, 1);
        let err = listener.wait_for_callback().await.unwrap_err();
        assert!(matches!(err, AuthError::OAuthProtocol(_)));
    }
}
