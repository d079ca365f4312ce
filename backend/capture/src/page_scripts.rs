//! Small one-off scripts evaluated around the capture itself.

pub const SCROLLBAR_STYLE_ID: &str = "fullshot-hide-scrollbars";

pub const HIDE_SCROLLBARS_JS: &str = r#"(() => {
  if (document.getElementById('fullshot-hide-scrollbars')) return true;
  const style = document.createElement('style');
  style.id = 'fullshot-hide-scrollbars';
  style.textContent = '::-webkit-scrollbar{display:none!important}*{scrollbar-width:none!important}';
  (document.head || document.documentElement).appendChild(style);
  return true;
})()"#;

pub const REMOVE_SCROLLBAR_STYLE_JS: &str = r#"(() => {
  const style = document.getElementById('fullshot-hide-scrollbars');
  if (style) style.remove();
  return !!style;
})()"#;

/// Swallows resize events and parks ResizeObserver callbacks while the viewport is
/// overridden, so frameworks do not re-apply the styles the normalizer just lifted.
pub const INSTALL_RESIZE_GUARD_JS: &str = r#"(() => {
  if (window.__fullshotResizeGuard) return true;
  const stop = (event) => event.stopImmediatePropagation();
  window.addEventListener('resize', stop, true);
  const Original = window.ResizeObserver;
  if (Original) {
    window.ResizeObserver = class {
      constructor() {}
      observe() {}
      unobserve() {}
      disconnect() {}
    };
  }
  window.__fullshotResizeGuard = { stop, Original };
  return true;
})()"#;

pub const REMOVE_RESIZE_GUARD_JS: &str = r#"(() => {
  const guard = window.__fullshotResizeGuard;
  if (!guard) return false;
  window.removeEventListener('resize', guard.stop, true);
  if (guard.Original) window.ResizeObserver = guard.Original;
  delete window.__fullshotResizeGuard;
  return true;
})()"#;

pub const DEVICE_PIXEL_RATIO_JS: &str = "window.devicePixelRatio";

pub const HAS_FOCUS_JS: &str = "document.hasFocus()";
