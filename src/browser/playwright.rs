//! Playwright integration for headless page capture.
//!
//! This module contains the inline Playwright script and the mapping from
//! helper stderr/status output to [`RenderError`].

use std::io;

use super::renderer::RenderError;

/// Captures one page sample: diagnostics, element descriptors, DOM counts,
/// HTML and a full-page screenshot.
///
/// Arguments: url, width, height, navigation timeout (ms), settle delay (ms),
/// screenshot path, headless flag.
pub(crate) const CAPTURE_SCRIPT: &str = r#"
const [, url, width, height, navTimeout, settleDelay, screenshotPath, headlessFlag] = process.argv;

async function run() {
  let browser;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
    const context = await browser.newContext({
      viewport: {
        width: parseInt(width, 10),
        height: parseInt(height, 10)
      }
    });
    const page = await context.newPage();

    const errors = [];
    const consoleErrors = [];
    const networkErrors = [];
    page.on('pageerror', err => errors.push(err && err.message ? err.message : String(err)));
    page.on('console', msg => {
      if (msg.type() === 'error') consoleErrors.push(msg.text());
    });
    page.on('requestfailed', request => {
      const failure = request.failure();
      networkErrors.push({ url: request.url(), failure: failure ? failure.errorText : '' });
    });

    await page.goto(url, { waitUntil: 'networkidle', timeout: parseInt(navTimeout, 10) });
    await page.waitForTimeout(parseInt(settleDelay, 10));

    const dom = await page.evaluate(() => {
      const selector = 'button, form, input, img, h1, h2, h3, a, .btn, [class*="button"], [class*="cart"], [class*="checkout"]';
      const elements = [];
      document.querySelectorAll(selector).forEach((el, index) => {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const isImg = el.tagName === 'IMG';
        elements.push({
          tag: el.tagName.toLowerCase(),
          id: el.id || null,
          class: typeof el.className === 'string' ? el.className : (el.getAttribute('class') || null),
          text: el.innerText || '',
          display: style.display,
          visibility: style.visibility,
          opacity: style.opacity,
          fontSize: style.fontSize,
          color: style.color,
          backgroundColor: style.backgroundColor,
          width: style.width,
          height: style.height,
          x: Math.round(rect.left + window.scrollX),
          y: Math.round(rect.top + window.scrollY),
          rectWidth: Math.round(rect.width),
          rectHeight: Math.round(rect.height),
          isImg,
          imgSrc: isImg ? el.src : null,
          imgLoaded: isImg ? (el.complete && el.naturalHeight !== 0) : null,
          index
        });
      });
      return {
        title: document.title,
        bodyHtml: document.body ? document.body.innerHTML : '',
        counts: {
          elements: document.querySelectorAll('*').length,
          forms: document.querySelectorAll('form').length,
          buttons: document.querySelectorAll('button').length,
          inputs: document.querySelectorAll('input').length,
          images: document.querySelectorAll('img').length
        },
        elements
      };
    });

    const fullHtml = await page.content();
    await page.screenshot({ path: screenshotPath, fullPage: true });

    console.log(JSON.stringify({
      status: 'ok',
      capture: { ...dom, fullHtml, errors, consoleErrors, networkErrors }
    }));
  } catch (err) {
    const message = err && err.message ? err.message : String(err);
    console.error(JSON.stringify({ status: 'error', message }));
    process.exitCode = 1;
  } finally {
    if (browser) {
      await browser.close();
    }
  }
}

run();
"#;

/// Error result from the Playwright script.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ScriptError {
    pub status: String,
    pub message: String,
}

pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> RenderError {
    if err.kind() == io::ErrorKind::NotFound {
        RenderError::NodeUnavailable {
            command: command.to_string(),
        }
    } else {
        RenderError::Io(err)
    }
}

/// Maps helper stderr output from a failed run to a [`RenderError`].
pub(crate) fn map_playwright_error(status_text: impl Into<String>, stderr: &str) -> RenderError {
    if let Some(error) = stderr
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<ScriptError>(line.trim()).ok())
    {
        return map_playwright_status_error(&error.status, error.message);
    }

    if stderr
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
    {
        return RenderError::PlaywrightMissing;
    }

    RenderError::Script {
        status: status_text.into(),
        message: format!("Playwright exited abnormally: {}", stderr.trim()),
    }
}

pub(crate) fn map_playwright_status_error(status: &str, message: String) -> RenderError {
    if message
        .to_ascii_lowercase()
        .contains("cannot find module 'playwright'")
    {
        RenderError::PlaywrightMissing
    } else {
        RenderError::Script {
            status: status.to_string(),
            message,
        }
    }
}
