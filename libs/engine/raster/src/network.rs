// This file is part of Terrella.
//
// Terrella is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Terrella is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Terrella.  If not, see <http://www.gnu.org/licenses/>.
use crate::error::FetchError;
use geo::TileKey;
use jobs::JobHandle;
use log::{debug, warn};
use std::{collections::BTreeMap, sync::OnceLock, time::Duration};

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Blocking tile download from a templated URL. Runs on worker threads
/// only; the per-attempt timeout and the cancellation checks between
/// attempts keep a wedged server from pinning a worker.
///
/// Template placeholders: `{west} {south} {east} {north} {level} {row}
/// {column} {width} {height}`. Extra options are appended as query
/// parameters, which is enough to express WMS, ArcGIS export, and plain
/// XYZ-style endpoints.
pub struct NetworkFetcher {
    url_template: String,
    options: BTreeMap<String, String>,
    timeout_ms: u64,
    max_attempts: u32,
    client: OnceLock<Option<reqwest::blocking::Client>>,
}

impl NetworkFetcher {
    pub fn new<S: Into<String>>(url_template: S) -> Self {
        Self {
            url_template: url_template.into(),
            options: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            client: OnceLock::new(),
        }
    }

    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A stable description of everything that affects the returned bytes;
    /// hashed into the cache identity.
    pub fn descriptor(&self) -> String {
        let mut descriptor = self.url_template.clone();
        for (key, value) in &self.options {
            descriptor.push_str(&format!("&{}={}", key, value));
        }
        descriptor
    }

    pub fn full_url(&self, key: &TileKey, width: u32, height: u32) -> String {
        let extents = key.extents();
        let mut url = self
            .url_template
            .replace("{west}", &format!("{}", extents.min_lon()))
            .replace("{south}", &format!("{}", extents.min_lat()))
            .replace("{east}", &format!("{}", extents.max_lon()))
            .replace("{north}", &format!("{}", extents.max_lat()))
            .replace("{level}", &format!("{}", key.level()))
            .replace("{row}", &format!("{}", key.row()))
            .replace("{column}", &format!("{}", key.column()))
            .replace("{width}", &format!("{}", width))
            .replace("{height}", &format!("{}", height));
        if !self.options.is_empty() {
            let mut separator = if url.contains('?') { '&' } else { '?' };
            for (key, value) in &self.options {
                url.push(separator);
                url.push_str(&format!("{}={}", key, value));
                separator = '&';
            }
        }
        url
    }

    fn client(&self) -> Option<&reqwest::blocking::Client> {
        self.client
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(Duration::from_millis(self.timeout_ms))
                    .build()
                    .map_err(|err| warn!("could not build http client: {}", err))
                    .ok()
            })
            .as_ref()
    }

    /// GET the tile, retrying transient failures with exponential backoff
    /// up to `max_attempts`.
    pub fn fetch_bytes(
        &self,
        key: &TileKey,
        width: u32,
        height: u32,
        handle: &JobHandle,
    ) -> Result<Vec<u8>, FetchError> {
        let url = self.full_url(key, width, height);
        let client = self
            .client()
            .ok_or_else(|| FetchError::BadInput("http client unavailable".into()))?;

        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            handle.check_canceled()?;
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(250 << attempt.min(6)));
                handle.check_canceled()?;
            }
            match client
                .get(url.as_str())
                .send()
                .and_then(|r| r.error_for_status())
            {
                Ok(response) => match response.bytes() {
                    Ok(bytes) => {
                        debug!("fetched {} ({} bytes)", url, bytes.len());
                        return Ok(bytes.to_vec());
                    }
                    Err(err) => last_error = err.to_string(),
                },
                Err(err) => last_error = err.to_string(),
            }
            debug!(
                "attempt {}/{} for {} failed: {}",
                attempt + 1,
                self.max_attempts,
                url,
                last_error
            );
        }
        Err(FetchError::Network(format!("{}: {}", url, last_error)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use geo::{Extents, GridSize, ImageSize};

    fn key() -> TileKey {
        TileKey::new(
            1,
            2,
            3,
            Extents::new(-180., -90., 0., 90.),
            GridSize::new(17, 17),
            ImageSize::new(256, 256),
        )
    }

    #[test]
    fn test_template_substitution() {
        let fetcher = NetworkFetcher::new(
            "http://tiles.example/{level}/{row}/{column}.png?w={width}&h={height}",
        );
        assert_eq!(
            fetcher.full_url(&key(), 256, 128),
            "http://tiles.example/3/1/2.png?w=256&h=128"
        );
    }

    #[test]
    fn test_wms_style_options() {
        let mut options = BTreeMap::new();
        options.insert("request".to_owned(), "GetMap".to_owned());
        options.insert("layers".to_owned(), "base".to_owned());
        let fetcher =
            NetworkFetcher::new("http://wms.example/map?bbox={west},{south},{east},{north}")
                .with_options(options);
        let url = fetcher.full_url(&key(), 64, 64);
        assert_eq!(
            url,
            "http://wms.example/map?bbox=-180,-90,0,90&layers=base&request=GetMap"
        );
    }
}
