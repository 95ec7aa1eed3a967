//! Stealth evasion JavaScript injected before any page script runs.
//! Based on puppeteer-extra-plugin-stealth techniques.

use std::path::Path;

use crate::error::AcquireError;

pub const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix permissions
    r#"
    (() => {
        const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
        if (!originalQuery) return;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
            Promise.resolve({ state: Notification.permission }) :
            originalQuery(parameters)
        );
    })();
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['zh-CN', 'zh', 'en-US', 'en'],
        configurable: true
    });
    "#,
    // Keep platform consistent with the Windows user agent
    r#"
    Object.defineProperty(navigator, 'platform', {
        get: () => 'Win32',
        configurable: true
    });
    "#,
    // Remove automation-related properties
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
    // Fix WebGL vendor/renderer (common detection vector)
    r#"
    (() => {
        if (typeof WebGLRenderingContext === 'undefined') return;
        const getParameter = WebGLRenderingContext.prototype.getParameter;
        WebGLRenderingContext.prototype.getParameter = function(parameter) {
            if (parameter === 37445) return 'Intel Inc.';
            if (parameter === 37446) return 'Intel Iris OpenGL Engine';
            return getParameter.call(this, parameter);
        };
    })();
    "#,
];

/// Scripts to register for a new session: the built-ins, then the user's
/// script if one is configured.
///
/// A configured script that cannot be read is a warning, unless `required`
/// is set, in which case launching must not proceed.
pub fn collect_scripts(extra: Option<&Path>, required: bool) -> Result<Vec<String>, AcquireError> {
    let mut scripts: Vec<String> = STEALTH_SCRIPTS.iter().map(|s| s.to_string()).collect();

    if let Some(path) = extra {
        match std::fs::read_to_string(path) {
            Ok(script) if !script.trim().is_empty() => scripts.push(script),
            Ok(_) => tracing::warn!("Stealth script {} is empty, skipping", path.display()),
            Err(e) if required => {
                return Err(AcquireError::Launch(format!(
                    "anti-detection script {} unavailable: {}",
                    path.display(),
                    e
                )))
            }
            Err(e) => tracing::warn!(
                "Stealth script {} unavailable ({}), continuing with built-in evasions",
                path.display(),
                e
            ),
        }
    }

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_only() {
        let scripts = collect_scripts(None, true).unwrap();
        assert_eq!(scripts.len(), STEALTH_SCRIPTS.len());
        assert!(scripts[0].contains("webdriver"));
    }

    #[test]
    fn test_user_script_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stealth.min.js");
        std::fs::write(&path, "window.__patched = true;").unwrap();

        let scripts = collect_scripts(Some(&path), false).unwrap();
        assert_eq!(scripts.last().unwrap(), "window.__patched = true;");
    }

    #[test]
    fn test_missing_script_is_warning_unless_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.js");

        assert!(collect_scripts(Some(&path), false).is_ok());
        assert!(matches!(
            collect_scripts(Some(&path), true),
            Err(AcquireError::Launch(_))
        ));
    }
}
