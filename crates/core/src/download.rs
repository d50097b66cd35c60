//! File downloads with a bounded number of attempts.
//!
//! Every attempt is shown through the indicator. The output file is written
//! in place; a failed attempt may leave a partial file behind, and the last
//! attempt wins.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::DownloadPolicy;
use crate::error::{Error, Result};
use crate::policy::UNKNOWN_EXIT_CODE;
use crate::status::Status;
use crate::supervisor::{SupervisedResult, Supervisor};

#[derive(Error, Debug)]
enum FetchError {
    #[error("{}", .0)]
    Request(#[from] reqwest::Error),

    #[error("server answered {}", .0)]
    Status(StatusCode),

    #[error("could not write `{}`: {}", .path, .original)]
    Write { path: String, original: io::Error },
}

impl FetchError {
    fn write(path: &Path, original: io::Error) -> Self {
        Self::Write {
            path: path.display().to_string(),
            original,
        }
    }
}

fn fetch(client: &Client, url: &str, output: &Path) -> std::result::Result<u64, FetchError> {
    let mut response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FetchError::write(parent, e))?;
        }
    }

    let mut file = File::create(output).map_err(|e| FetchError::write(output, e))?;
    Ok(response.copy_to(&mut file)?)
}

impl Supervisor {
    /// Downloads `url` to `output`, retrying as `policy` allows.
    ///
    /// Returns exit code `0` on success and `1` once every attempt failed,
    /// with the last failure in `stderr`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyUrl`] if `url` is blank, or [`Error::Http`] if
    /// the HTTP client cannot be built.
    pub fn download(
        &mut self,
        url: &str,
        output: &str,
        description: &str,
        policy: &DownloadPolicy,
    ) -> Result<SupervisedResult> {
        if url.trim().is_empty() {
            return Err(Error::EmptyUrl);
        }

        let description = if description.is_empty() { url } else { description };
        let output = shellexpand::tilde(output).to_string();
        let output = Path::new(&output);

        let mut builder = Client::builder().timeout(policy.attempt_timeout);
        if !policy.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        let label = self.display_message(&format!("Downloading {description}"));
        let attempts = policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.indicator
                .start(&format!("{label} (attempt {attempt}/{attempts})"));

            match fetch(&client, url, output) {
                Ok(bytes) => {
                    info!("Downloaded {bytes} bytes from {url} to {}", output.display());
                    self.indicator
                        .stop(Status::Success, &format!("Downloaded {description}"));
                    return Ok(SupervisedResult {
                        exit_code: 0,
                        stdout: output.display().to_string(),
                        stderr: String::new(),
                        timed_out: false,
                    });
                }
                Err(e) => {
                    debug!("Download attempt {attempt} of {url} failed: {e}");
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                self.indicator.stop(
                    Status::Warning,
                    &format!("Attempt {attempt}/{attempts} failed: {last_error}"),
                );
                thread::sleep(policy.retry_delay);
            }
        }

        self.indicator.stop(
            Status::Error,
            &format!("Failed to download {description} after {attempts} attempts"),
        );

        Ok(SupervisedResult {
            exit_code: UNKNOWN_EXIT_CODE,
            stdout: String::new(),
            stderr: last_error,
            timed_out: false,
        })
    }
}
