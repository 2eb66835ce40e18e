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
use jobs::JobError;
use thiserror::Error;

/// How a layer fetch can go wrong. The stack reacts per kind: `Canceled`
/// unwinds silently, `Network` fails the build job so the tile retries,
/// `Decode` is handled inside the fetch as a cache miss, `OutOfRange`
/// skips the layer and the composite continues, `BadInput` propagates.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch canceled")]
    Canceled,
    #[error("network: {0}")]
    Network(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("cache i/o: {0}")]
    CacheIo(String),
    #[error("source declined: level or extents out of range")]
    OutOfRange,
    #[error("bad input: {0}")]
    BadInput(String),
}

impl From<JobError> for FetchError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Canceled => FetchError::Canceled,
            JobError::Failed(err) => FetchError::BadInput(format!("{:#}", err)),
        }
    }
}

impl From<FetchError> for JobError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Canceled => JobError::Canceled,
            other => JobError::Failed(anyhow::Error::new(other)),
        }
    }
}
