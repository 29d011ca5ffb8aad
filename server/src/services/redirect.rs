// server/src/services/redirect.rs

//! Builds the post-payment URL the buyer is sent back to.

use reqwest::Url;

/// Query parameters appended to a return URL.
#[derive(Debug, Clone, Copy)]
pub struct ReturnParams<'a> {
  pub status: &'a str,
  pub order_id: &'a str,
  pub tx_ref: &'a str,
  pub message: Option<&'a str>,
}

impl<'a> ReturnParams<'a> {
  fn pairs(&self) -> Vec<(&'static str, &'a str)> {
    let mut pairs = vec![("status", self.status), ("order_id", self.order_id), ("tx_ref", self.tx_ref)];
    if let Some(message) = self.message {
      pairs.push(("message", message));
    }
    pairs
  }
}

/// Sets the parameters on `return_url`, replacing any existing ones with the
/// same names and keeping the rest. A URL that does not parse gets the
/// encoded query appended verbatim.
pub fn build_return_url(return_url: &str, params: ReturnParams<'_>) -> String {
  let pairs = params.pairs();
  match Url::parse(return_url) {
    Ok(mut url) => {
      let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !pairs.iter().any(|(name, _)| *name == &**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
      {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(kept);
        query.extend_pairs(pairs);
      }
      url.to_string()
    }
    Err(_) => {
      let separator = if return_url.contains('?') { '&' } else { '?' };
      format!("{}{}{}", return_url, separator, encode_query(&pairs))
    }
  }
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
  Url::parse_with_params("http://localhost/", pairs)
    .ok()
    .and_then(|url| url.query().map(str::to_string))
    .unwrap_or_default()
}
