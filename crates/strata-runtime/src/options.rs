/// Tunables for one [`crate::World`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldOptions {
    /// Horizontal view radius in chunks.
    pub view_radius: i32,
    /// Vertical view radius in chunks.
    pub view_radius_y: i32,
    /// Keep per-chunk surfaces and a remesh queue.
    pub remesh: bool,
    /// Resolve stored data while creating a chunk instead of asynchronously.
    pub blocking_loads: bool,
    /// Most chunks one visibility pass may create; `None` creates all of them.
    pub visibility_batch: Option<usize>,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            view_radius: 3,
            view_radius_y: 1,
            remesh: true,
            blocking_loads: false,
            visibility_batch: Some(64),
        }
    }
}

impl WorldOptions {
    /// Server-side worlds: no surfaces, and loads resolve before a chunk is
    /// handed out so replies always carry stored edits.
    pub fn headless() -> Self {
        Self {
            remesh: false,
            blocking_loads: true,
            ..Self::default()
        }
    }

    /// Chebyshev chunk distance beyond which resident chunks are dropped.
    #[inline]
    pub fn unload_distance(&self) -> i32 {
        self.view_radius + 1
    }
}
