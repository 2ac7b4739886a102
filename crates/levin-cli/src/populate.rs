//! Foreground fetch of the remote torrent index into the watch directory.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;

const TORRENT_INDEX_URL: &str =
    "https://annas-archive.li/dyn/generate_torrents?max_tb=1&format=url";
const MAX_RETRIES: u32 = 3;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("levin/", env!("CARGO_PKG_VERSION"));

/// `levin populate`: fetch the index of torrent URLs and download each
/// missing metadata file into the watch directory.
pub fn populate(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => levin_config::load_from_path(path)?,
        None => levin_config::load()?,
    };
    std::fs::create_dir_all(&config.watch_directory).with_context(|| {
        format!(
            "failed to create watch directory {}",
            config.watch_directory.display()
        )
    })?;

    println!(
        "Fetching torrents into {} ...",
        config.watch_directory.display()
    );

    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;

    let index = fetch_with_retries(&client, TORRENT_INDEX_URL)
        .context("failed to fetch the torrent index")?;
    let urls: Vec<&str> = std::str::from_utf8(&index)
        .context("torrent index is not UTF-8")?
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    if urls.is_empty() {
        bail!("torrent index is empty");
    }

    let total = urls.len();
    let mut downloaded = 0_usize;
    for (position, &url) in urls.iter().enumerate() {
        let Some(filename) = filename_from_url(url) else {
            continue;
        };
        let dest = config.watch_directory.join(&filename);
        if dest.exists() {
            println!("[{}/{}] skipped (exists): {filename}", position + 1, total);
            continue;
        }

        println!("[{}/{}] downloading: {filename}", position + 1, total);
        match fetch_with_retries(&client, url) {
            Ok(body) => match std::fs::write(&dest, body) {
                Ok(()) => downloaded += 1,
                Err(err) => {
                    let _ = std::fs::remove_file(&dest);
                    println!("[{}/{}] failed: {filename}: {err}", position + 1, total);
                }
            },
            Err(err) => {
                println!("[{}/{}] failed: {filename}: {err:#}", position + 1, total);
            }
        }
    }

    println!("Done. {downloaded} torrents downloaded.");
    Ok(())
}

/// GET with up to three attempts and 1 s / 2 s backoff between them.
fn fetch_with_retries(client: &Client, url: &str) -> Result<Vec<u8>> {
    let mut last_error = None;
    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            std::thread::sleep(Duration::from_secs(1 << (attempt - 1)));
        }
        match client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
        {
            Ok(response) => match response.bytes() {
                Ok(body) => return Ok(body.to_vec()),
                Err(err) => last_error = Some(err),
            },
            Err(err) => last_error = Some(err),
        }
    }
    match last_error {
        Some(err) => Err(err.into()),
        None => bail!("no attempts made"),
    }
}

/// Last path component of a URL, query string stripped. `None` when the URL
/// has no usable file name.
fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let (_, name) = after_scheme.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
