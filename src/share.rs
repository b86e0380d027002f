//! Share/copy payloads for generated questions. Pure transformations.

use serde::Serialize;

use crate::util::js_string_escape;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinks {
  pub whatsapp: String,
  pub twitter: String,
  pub telegram: String,
  pub email: String,
}

pub fn share_links(text: &str) -> ShareLinks {
  let encoded = urlencoding::encode(text);
  ShareLinks {
    whatsapp: format!("https://wa.me/?text={}", encoded),
    twitter: format!("https://twitter.com/intent/tweet?text={}", encoded),
    telegram: format!("https://t.me/share/url?url=&text={}", encoded),
    email: format!(
      "mailto:?subject={}&body={}",
      urlencoding::encode("Higher-Order Thinking Questions"),
      encoded
    ),
  }
}

/// Script defining `copyToClipboard()` for the given text.
pub fn clipboard_script(text: &str) -> String {
  format!(
    "<script>\nfunction copyToClipboard() {{\n  navigator.clipboard.writeText(\"{}\")\n  .then(() => {{ alert('Copied to clipboard!'); }})\n  .catch(err => {{ console.error('Failed to copy: ', err); }});\n}}\n</script>",
    js_string_escape(text)
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn links_are_percent_encoded() {
    let links = share_links("1. Why? & how\n2. What");
    assert_eq!(links.whatsapp, "https://wa.me/?text=1.%20Why%3F%20%26%20how%0A2.%20What");
    assert!(links.email.starts_with("mailto:?subject=Higher-Order%20Thinking%20Questions&body=1.%20Why"));
    assert!(!links.twitter.contains(' '));
  }

  #[test]
  fn clipboard_payload_cannot_break_out_of_the_string() {
    let script = clipboard_script("say \"hi\"\n</script>");
    assert!(script.contains("writeText(\"say &quot;hi&quot;\\n&lt;/script&gt;\")"));
  }

  #[test]
  fn clipboard_text_ending_in_backslash_is_closed() {
    let script = clipboard_script("ends with \\");
    assert!(script.contains("writeText(\"ends with \\\\\")"));
  }
}
