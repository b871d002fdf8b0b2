//! Shared constants used across the application.

/// Default leading segment of every public id, also the first tag.
pub const DEFAULT_PUBLIC_ID_PREFIX: &str = "kiosk247";

/// Tag attached to every uploaded screenshot.
pub const SCREENSHOT_TAG: &str = "screenshot";

/// Scheme prepended to bare hosts from the URL list.
pub const TARGET_SCHEME: &str = "https://";

/// Extension of captured images.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Format of the per-cycle timestamp embedded in file names and public ids.
pub const CYCLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// In-page script evaluated before the screenshot is taken.
///
/// Hides cookie/consent banners and full-screen overlays so the capture shows
/// the page itself. Replaced wholesale by `CLEANUP_SCRIPT_PATH` when set.
pub const DEFAULT_CLEANUP_SCRIPT: &str = r#"(() => {
  const selectors = [
    '[id*="cookie" i]', '[class*="cookie" i]',
    '[id*="consent" i]', '[class*="consent" i]',
    '[id*="gdpr" i]', '[class*="gdpr" i]',
    '#onetrust-consent-sdk', '#CybotCookiebotDialog', '.fc-consent-root',
    '[aria-modal="true"]', '[class*="newsletter" i][class*="modal" i]'
  ];
  for (const selector of selectors) {
    document.querySelectorAll(selector).forEach((el) => el.remove());
  }
  document.querySelectorAll('body *').forEach((el) => {
    const style = window.getComputedStyle(el);
    if (style.position === 'fixed' && parseInt(style.zIndex || '0', 10) > 999) {
      el.remove();
    }
  });
  for (const el of [document.documentElement, document.body]) {
    el.style.setProperty('overflow', 'auto', 'important');
  }
})();"#;
