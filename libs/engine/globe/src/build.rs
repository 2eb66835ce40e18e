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

// The three tile-build job kinds. Jobs hold only weak references and a
// single-shot result channel: if the body or tile is gone by the time a
// worker picks the job up, it unwinds as canceled without touching
// anything. Results are installed by the owning tile's update tick, never
// from the worker.

use crate::{body::BodyInner, tile::Tile};
use crossbeam::channel::{bounded, Receiver, Sender};
use elevation::ElevationGrid;
use geo::TileKey;
use image::RgbaImage;
use jobs::{Job, JobError, JobHandle, JobResult};
use std::sync::{Arc, Weak};

/// Composite the raster stack into one tile texture.
pub(crate) struct BuildRaster {
    key: TileKey,
    body: Weak<BodyInner>,
    sender: Sender<Option<RgbaImage>>,
}

impl BuildRaster {
    pub(crate) fn new(
        key: TileKey,
        body: Weak<BodyInner>,
    ) -> (Self, Receiver<Option<RgbaImage>>) {
        let (sender, receiver) = bounded(1);
        (Self { key, body, sender }, receiver)
    }
}

impl Job for BuildRaster {
    fn name(&self) -> &str {
        "build-raster"
    }

    fn run(&self, handle: &JobHandle) -> JobResult {
        let body = self.body.upgrade().ok_or(JobError::Canceled)?;
        let size = self.key.image_size();
        let image = body
            .raster_stack()
            .build(&self.key, size.width, size.height, handle)
            .map_err(JobError::from)?;
        let _ = self.sender.send(image);
        Ok(())
    }
}

/// Merge the elevation stack into one tile grid.
pub(crate) struct BuildElevation {
    key: TileKey,
    width: u32,
    height: u32,
    body: Weak<BodyInner>,
    sender: Sender<Option<ElevationGrid>>,
}

impl BuildElevation {
    pub(crate) fn new(
        key: TileKey,
        width: u32,
        height: u32,
        body: Weak<BodyInner>,
    ) -> (Self, Receiver<Option<ElevationGrid>>) {
        let (sender, receiver) = bounded(1);
        (
            Self {
                key,
                width,
                height,
                body,
                sender,
            },
            receiver,
        )
    }
}

impl Job for BuildElevation {
    fn name(&self) -> &str {
        "build-elevation"
    }

    fn run(&self, handle: &JobHandle) -> JobResult {
        let body = self.body.upgrade().ok_or(JobError::Canceled)?;
        let grid = body
            .elevation_stack()
            .build(&self.key, self.width, self.height, handle)
            .map_err(JobError::from)?;
        let _ = self.sender.send(grid);
        Ok(())
    }
}

/// The 4-way subdivision: build all four child tiles with their imagery,
/// elevation, meshes, and vector jobs.
pub(crate) struct BuildTiles {
    parent: Weak<Tile>,
    body: Weak<BodyInner>,
    sender: Sender<[Arc<Tile>; 4]>,
}

impl BuildTiles {
    pub(crate) fn new(
        parent: Weak<Tile>,
        body: Weak<BodyInner>,
    ) -> (Self, Receiver<[Arc<Tile>; 4]>) {
        let (sender, receiver) = bounded(1);
        (
            Self {
                parent,
                body,
                sender,
            },
            receiver,
        )
    }
}

impl Job for BuildTiles {
    fn name(&self) -> &str {
        "build-tiles"
    }

    fn run(&self, handle: &JobHandle) -> JobResult {
        let parent = self.parent.upgrade().ok_or(JobError::Canceled)?;
        let body = self.body.upgrade().ok_or(JobError::Canceled)?;
        let children = parent.build_children(&body, handle)?;
        let _ = self.sender.send(children);
        Ok(())
    }
}
