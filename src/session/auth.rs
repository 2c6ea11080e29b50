//! Login state machine against the passport service.
//!
//! Establishing a session takes several sequential round trips: an
//! unauthenticated bootstrap request for a baseline identity cookie, a
//! login-token fetch, the credential submission (with at most one captcha
//! round), and a final scrape of the authenticated home page for the CSRF
//! token every mutating call requires. There is no credential refresh: a
//! session the server later rejects surfaces coded errors to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::api::hex_128bit;
use crate::error::{PanError, Result};
use crate::http::HttpClient;

const HOME_URL: &str = "https://www.baidu.com/";
const PAN_HOME_URL: &str = "https://pan.baidu.com/";
const PASSPORT_URL: &str = "https://passport.baidu.com/";

/// Cookie the bootstrap request must yield before login can proceed.
const IDENTITY_COOKIE: &str = "BAIDUID";

/// Login error code meaning a captcha must be solved.
const CAPTCHA_REQUIRED: i32 = 257;

/// Login error code meaning the account is already authenticated;
/// treated as success.
const ALREADY_LOGGED_IN: i32 = 18;

/// Callback invoked with the captcha image bytes when the server demands
/// a captcha mid-login. Returning `None` aborts the attempt.
pub type CaptchaSolver = Box<dyn Fn(&[u8]) -> Option<String> + Send + Sync>;

fn login_error_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("err_no=([0-9]+)").expect("valid regex"))
}

fn code_string_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("codeString=([a-zA-Z0-9]+)").expect("valid regex"))
}

fn bds_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("\"bdstoken\":\"([a-z0-9]{32})\"").expect("valid regex"))
}

/// An authenticated session.
///
/// Holds the shared cookie store (via the HTTP client) and the CSRF
/// token. At most one credential is live per session; it is invalidated
/// by [`Session::logout`] or by dropping the process.
pub struct Session {
    http: HttpClient,
    username: String,
    bds_token: String,
    logged_out: AtomicBool,
}

impl Session {
    /// Log in and return a ready-to-use session.
    ///
    /// Runs the full login sequence to completion; the returned session
    /// is never half-established. When the server demands a captcha and
    /// `captcha_solver` is supplied, it is invoked once with the
    /// challenge image bytes and the credentials are resubmitted with its
    /// answer; there is no second captcha round.
    pub async fn login(
        username: &str,
        password: &str,
        captcha_solver: Option<&CaptchaSolver>,
    ) -> Result<Self> {
        let http = HttpClient::new()?;

        bootstrap_identity(&http).await?;
        let token = fetch_login_token(&http).await?;
        submit_credentials(&http, username, password, &token, captcha_solver).await?;
        let bds_token = fetch_bds_token(&http).await?;
        debug!(username, "session established");

        Ok(Session {
            http,
            username: username.to_string(),
            bds_token,
            logged_out: AtomicBool::new(false),
        })
    }

    /// The username this session was established for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The HTTP client carrying this session's identity cookies.
    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// The CSRF token required on mutating calls.
    pub(crate) fn bds_token(&self) -> &str {
        &self.bds_token
    }

    /// Log out, invalidating the credential on the server.
    ///
    /// Idempotent: a second call is a no-op and never re-raises.
    pub async fn logout(&self) -> Result<()> {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let url = format!("{}?logout", PASSPORT_URL);
        if let Err(err) = self.http.get(&url).await {
            warn!(%err, "logout request failed");
            return Err(err);
        }
        debug!(username = %self.username, "logged out");
        Ok(())
    }
}

/// Obtain the baseline identity cookie by visiting the home page.
async fn bootstrap_identity(http: &HttpClient) -> Result<()> {
    let response = http.get(HOME_URL).await?;
    let found = response
        .cookies()
        .any(|cookie| cookie.name() == IDENTITY_COOKIE);
    if !found {
        return Err(PanError::format(format!(
            "cookie \"{}\" missing from bootstrap response",
            IDENTITY_COOKIE
        )));
    }
    debug!("identity cookie obtained");
    Ok(())
}

/// Fetch the login token from the passport endpoint.
async fn fetch_login_token(http: &HttpClient) -> Result<String> {
    let url = format!("{}v2/api/?getapi&tpl=netdisk&apiver=v3", PASSPORT_URL);
    let body = http.get_text(&url).await?;
    let result: crate::api::types::LoginTokenResult = serde_json::from_str(&body)?;

    if result.error_info.no != 0 {
        return Err(PanError::login(result.error_info.no));
    }
    let token = result
        .data
        .ok_or_else(|| PanError::format("login token response missing data"))?
        .token;
    if !hex_128bit().is_match(&token) {
        return Err(PanError::format("login token is not a 32-char hex value"));
    }
    debug!("login token obtained");
    Ok(token)
}

/// POST the credentials, returning the raw response body.
async fn do_login_request(
    http: &HttpClient,
    username: &str,
    password: &str,
    token: &str,
    code_string: Option<&str>,
    captcha_answer: Option<&str>,
) -> Result<String> {
    let url = format!("{}v2/api/?login", PASSPORT_URL);
    let mut params = vec![
        ("tpl", "netdisk"),
        ("apiver", "v3"),
        ("username", username),
        ("password", password),
        ("token", token),
    ];
    if let Some(code_string) = code_string {
        params.push(("codestring", code_string));
    }
    if let Some(answer) = captcha_answer {
        params.push(("verifycode", answer));
    }
    let response = http.post_form(&url, &params).await?;
    Ok(response.text().await?)
}

/// Extract the numeric login error code from a login response body.
fn extract_login_error_code(body: &str) -> Result<i32> {
    let captures = login_error_code_pattern()
        .captures(body)
        .ok_or_else(|| PanError::format("login response has no err_no field"))?;
    captures[1]
        .parse()
        .map_err(|_| PanError::format("login error code is not a number"))
}

/// Extract the captcha code-string from a login response body.
fn extract_code_string(body: &str) -> Result<String> {
    let captures = code_string_pattern()
        .captures(body)
        .ok_or_else(|| PanError::format("captcha response has no codeString field"))?;
    Ok(captures[1].to_string())
}

/// Fetch the captcha challenge image for a code-string.
async fn fetch_captcha(http: &HttpClient, code_string: &str) -> Result<Vec<u8>> {
    let url = format!(
        "{}cgi-bin/genimage?{}",
        PASSPORT_URL,
        crate::api::client::encode(code_string)
    );
    Ok(http.get_bytes(&url).await?.to_vec())
}

/// Outcome of one credential-submission round.
#[derive(Debug, PartialEq, Eq)]
enum LoginOutcome {
    Accepted,
    CaptchaNeeded,
    Rejected(i32),
}

/// Decide what a round's error code means. Codes 0 and 18 succeed; the
/// captcha sentinel opens a captcha round only when a solver is at hand
/// and none has been spent yet; everything else rejects immediately.
fn evaluate_login_code(code: i32, has_solver: bool, retried: bool) -> LoginOutcome {
    if code == 0 || code == ALREADY_LOGGED_IN {
        LoginOutcome::Accepted
    } else if code == CAPTCHA_REQUIRED && has_solver && !retried {
        LoginOutcome::CaptchaNeeded
    } else {
        LoginOutcome::Rejected(code)
    }
}

/// Run the solver over the challenge image. A solver that declines
/// surfaces the captcha-required code itself.
fn solve_captcha(solver: &CaptchaSolver, image: &[u8]) -> Result<String> {
    solver(image).ok_or_else(|| PanError::login(CAPTCHA_REQUIRED))
}

/// Submit the credentials, solving at most one captcha round.
async fn submit_credentials(
    http: &HttpClient,
    username: &str,
    password: &str,
    token: &str,
    captcha_solver: Option<&CaptchaSolver>,
) -> Result<()> {
    let body = do_login_request(http, username, password, token, None, None).await?;
    let code = extract_login_error_code(&body)?;

    match evaluate_login_code(code, captcha_solver.is_some(), false) {
        LoginOutcome::Accepted => Ok(()),
        LoginOutcome::Rejected(code) => Err(PanError::login(code)),
        LoginOutcome::CaptchaNeeded => {
            // evaluate_login_code only asks for a captcha when a solver
            // was supplied.
            let solver = captcha_solver
                .ok_or_else(|| PanError::login(CAPTCHA_REQUIRED))?;
            let code_string = extract_code_string(&body)?;
            debug!("captcha required, invoking solver");
            let image = fetch_captcha(http, &code_string).await?;
            let answer = solve_captcha(solver, &image)?;
            let body = do_login_request(
                http,
                username,
                password,
                token,
                Some(&code_string),
                Some(&answer),
            )
            .await?;
            let code = extract_login_error_code(&body)?;
            match evaluate_login_code(code, true, true) {
                LoginOutcome::Accepted => Ok(()),
                _ => Err(PanError::login(code)),
            }
        }
    }
}

/// Extract the CSRF token from the authenticated home page.
fn extract_bds_token(body: &str) -> Result<String> {
    let captures = bds_token_pattern()
        .captures(body)
        .ok_or_else(|| PanError::format("home page has no bdstoken field"))?;
    Ok(captures[1].to_string())
}

async fn fetch_bds_token(http: &HttpClient) -> Result<String> {
    let body = http.get_text(PAN_HOME_URL).await?;
    let token = extract_bds_token(&body)?;
    debug!("bdstoken obtained");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_login_error_code() {
        assert_eq!(extract_login_error_code("foo&err_no=0&bar").unwrap(), 0);
        assert_eq!(extract_login_error_code("err_no=257&codeString=x").unwrap(), 257);
        assert_eq!(extract_login_error_code("err_no=18").unwrap(), 18);
    }

    #[test]
    fn test_missing_error_code_is_format_error() {
        let err = extract_login_error_code("errorCode=4").unwrap_err();
        assert!(matches!(err, PanError::Format(_)));
    }

    #[test]
    fn test_extract_code_string() {
        assert_eq!(
            extract_code_string("err_no=257&codeString=jxG4f&t=1").unwrap(),
            "jxG4f"
        );
        assert!(matches!(
            extract_code_string("err_no=257").unwrap_err(),
            PanError::Format(_)
        ));
    }

    #[test]
    fn test_extract_bds_token() {
        let body = r#"var ctx = {"bdstoken":"0123456789abcdef0123456789abcdef","other":1}"#;
        assert_eq!(
            extract_bds_token(body).unwrap(),
            "0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn test_bds_token_must_be_hex_128bit() {
        // Uppercase and short values do not match the token pattern.
        let upper = r#""bdstoken":"0123456789ABCDEF0123456789ABCDEF""#;
        assert!(matches!(
            extract_bds_token(upper).unwrap_err(),
            PanError::Format(_)
        ));
        let short = r#""bdstoken":"0123456789abcdef""#;
        assert!(matches!(
            extract_bds_token(short).unwrap_err(),
            PanError::Format(_)
        ));
    }

    #[test]
    fn test_login_token_shape_validation() {
        assert!(hex_128bit().is_match("00000000000000000000000000000000"));
        assert!(!hex_128bit().is_match("not-a-token"));
    }

    #[test]
    fn test_success_codes_are_accepted() {
        assert_eq!(evaluate_login_code(0, false, false), LoginOutcome::Accepted);
        assert_eq!(
            evaluate_login_code(ALREADY_LOGGED_IN, false, false),
            LoginOutcome::Accepted
        );
        // A solver changes nothing about a success code.
        assert_eq!(evaluate_login_code(0, true, false), LoginOutcome::Accepted);
    }

    #[test]
    fn test_other_codes_reject_without_a_second_round() {
        assert_eq!(
            evaluate_login_code(4, false, false),
            LoginOutcome::Rejected(4)
        );
        // A solver does not turn a wrong password into a captcha round.
        assert_eq!(
            evaluate_login_code(4, true, false),
            LoginOutcome::Rejected(4)
        );
        assert_eq!(
            evaluate_login_code(-1, true, false),
            LoginOutcome::Rejected(-1)
        );
    }

    #[test]
    fn test_captcha_round_requires_a_solver() {
        assert_eq!(
            evaluate_login_code(CAPTCHA_REQUIRED, true, false),
            LoginOutcome::CaptchaNeeded
        );
        assert_eq!(
            evaluate_login_code(CAPTCHA_REQUIRED, false, false),
            LoginOutcome::Rejected(CAPTCHA_REQUIRED)
        );
    }

    #[test]
    fn test_second_captcha_demand_rejects() {
        // One captcha round per login; a repeat demand after the
        // resubmission fails instead of opening a third round.
        assert_eq!(
            evaluate_login_code(CAPTCHA_REQUIRED, true, true),
            LoginOutcome::Rejected(CAPTCHA_REQUIRED)
        );
    }

    #[test]
    fn test_declining_solver_aborts_with_captcha_code() {
        let declining: CaptchaSolver = Box::new(|_| None);
        let err = solve_captcha(&declining, b"image").unwrap_err();
        assert_eq!(err.code(), Some(CAPTCHA_REQUIRED));

        let answering: CaptchaSolver = Box::new(|_| Some("jxG4f".to_string()));
        assert_eq!(solve_captcha(&answering, b"image").unwrap(), "jxG4f");
    }
}
