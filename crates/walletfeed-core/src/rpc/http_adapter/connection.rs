use std::path::Path;

use reqwest::Url;

use crate::error::CoreError;

/// A validated RPC endpoint with any credentials embedded in its URL split
/// out, so they are never logged as part of the URL.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Endpoint {
    pub(super) url: String,
    pub(super) url_auth: Option<(String, String)>,
}

pub(super) fn parse_connection(connection: &str) -> Result<Endpoint, CoreError> {
    let mut parsed = Url::parse(connection).map_err(|e| {
        CoreError::Config(format!(
            "invalid rpc url `{connection}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(CoreError::Config(format!(
                "unsupported rpc url scheme `{other}`; expected http or https"
            )))
        }
    }

    let url_auth = match (parsed.username(), parsed.password()) {
        ("", None) => None,
        (user, Some(pass)) if !user.is_empty() => Some((user.to_owned(), pass.to_owned())),
        _ => {
            return Err(CoreError::Config(
                "rpc url credentials must be `user:password`".to_owned(),
            ))
        }
    };
    if url_auth.is_some() {
        // Only fails for cannot-be-a-base URLs, already excluded by the scheme check.
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);
    }

    Ok(Endpoint {
        url: parsed.to_string(),
        url_auth,
    })
}

/// Pick the credentials for the endpoint.
///
/// Precedence:
/// 1. explicit `user` + `pass`
/// 2. credentials embedded in the URL
/// 3. cookie file (`username:password`) from `cookie_file`
/// 4. no auth
pub(super) fn resolve_auth(
    user: Option<&str>,
    pass: Option<&str>,
    url_auth: Option<(String, String)>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, CoreError> {
    match (user, pass) {
        (Some(u), Some(p)) => return Ok(Some((u.to_owned(), p.to_owned()))),
        (Some(_), None) | (None, Some(_)) => {
            return Err(CoreError::Config(
                "rpc user and rpc pass must be set together".to_owned(),
            ));
        }
        (None, None) => {}
    }

    if url_auth.is_some() {
        return Ok(url_auth);
    }

    let Some(cookie_file) = cookie_file else {
        return Ok(None);
    };
    read_cookie_file(cookie_file).map(Some)
}

fn read_cookie_file(path: &Path) -> Result<(String, String), CoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!(
            "failed to read rpc cookie file {}: {e}",
            path.display()
        ))
    })?;
    let line = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| CoreError::Config(format!("rpc cookie file {} is empty", path.display())))?;

    match line.split_once(':') {
        Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {
            Ok((user.to_owned(), pass.to_owned()))
        }
        _ => Err(CoreError::Config(format!(
            "rpc cookie file {} must contain non-empty `username:password`",
            path.display()
        ))),
    }
}
