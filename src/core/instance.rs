use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::core::{ActionRecord, ContainerRect, Propagation};
use crate::error::{ChartError, ChartResult};
use crate::render::{Color, RasterImage};

/// Opaque identity of one registered chart instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart_{}", self.0)
    }
}

/// Surface kind an instance renders with. Also used as the export encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    Raster,
    Vector,
}

/// Boundary implemented by the charting engine that owns one instance.
///
/// The connector never owns instances. It calls back into them to apply
/// propagated actions and to read their surfaces during export.
pub trait ChartInstance {
    fn renderer_kind(&self) -> RendererKind;

    /// Current container position and size in logical pixels.
    fn container_rect(&self) -> ContainerRect;

    /// Background the instance paints behind its own content, if any.
    fn background_color(&self) -> Option<Color> {
        None
    }

    /// Applies `action` and re-renders.
    ///
    /// `Propagation::Connected` means the action is a replay coming from a
    /// peer; implementations must not forward it to the connector again.
    fn apply_action(&mut self, action: &ActionRecord, propagation: Propagation)
    -> ChartResult<()>;

    /// Current visual state as a pixel buffer of `logical size * pixel_ratio`.
    /// Pixels the instance does not paint stay fully transparent.
    fn read_raster(&self, pixel_ratio: f64) -> ChartResult<RasterImage>;

    /// Current visual state as a standalone `<svg>` document.
    fn read_vector_markup(&self) -> ChartResult<String>;

    /// Whether this instance can produce `encoding` output at all.
    fn supports_encoding(&self, encoding: RendererKind) -> bool {
        encoding == self.renderer_kind()
    }
}

/// Non-owning handle to a registered instance.
///
/// The handle stays valid only while the owner keeps the instance alive and
/// has not disposed it; every access re-checks both conditions.
#[derive(Clone)]
pub struct InstanceHandle {
    id: InstanceId,
    instance: Weak<RefCell<dyn ChartInstance>>,
    disposed: Rc<Cell<bool>>,
}

impl InstanceHandle {
    pub(crate) fn new<C>(id: InstanceId, instance: &Rc<RefCell<C>>) -> Self
    where
        C: ChartInstance + 'static,
    {
        let shared: Rc<RefCell<dyn ChartInstance>> = instance.clone();
        Self {
            id,
            instance: Rc::downgrade(&shared),
            disposed: Rc::new(Cell::new(false)),
        }
    }

    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.disposed.get() && self.instance.strong_count() > 0
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.is_alive()
    }

    /// Marks the handle (and every clone of it) disposed.
    pub(crate) fn mark_disposed(&self) {
        self.disposed.set(true);
    }

    pub(crate) fn same_instance(&self, other: &Self) -> bool {
        self.id == other.id
    }

    fn upgrade(&self) -> ChartResult<Rc<RefCell<dyn ChartInstance>>> {
        if self.disposed.get() {
            return Err(ChartError::DisposedInstance(self.id));
        }
        self.instance
            .upgrade()
            .ok_or(ChartError::DisposedInstance(self.id))
    }

    /// Runs `f` with shared access to the instance.
    pub fn with_instance<R>(&self, f: impl FnOnce(&dyn ChartInstance) -> R) -> ChartResult<R> {
        let shared = self.upgrade()?;
        let guard = shared
            .try_borrow()
            .map_err(|_| ChartError::InstanceBusy(self.id))?;
        Ok(f(&*guard))
    }

    /// Runs `f` with exclusive access to the instance.
    pub fn with_instance_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn ChartInstance) -> R,
    ) -> ChartResult<R> {
        let shared = self.upgrade()?;
        let mut guard = shared
            .try_borrow_mut()
            .map_err(|_| ChartError::InstanceBusy(self.id))?;
        Ok(f(&mut *guard))
    }

    pub fn renderer_kind(&self) -> ChartResult<RendererKind> {
        self.with_instance(|instance| instance.renderer_kind())
    }

    pub fn container_rect(&self) -> ChartResult<ContainerRect> {
        self.with_instance(|instance| instance.container_rect())
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

impl Eq for InstanceHandle {}
