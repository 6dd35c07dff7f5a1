use crate::config::{BagSize, MilConfig, PoolMethod};
use crate::debug::{debug_println, DebugMask, Timer};
use crate::error::MilError;
use crate::scalar::Scalar;
use crate::shape::Shape;
use alloc::vec;
use alloc::vec::Vec;

/// Lifecycle of [`MilPool`].
///
/// Unconfigured -> Configured -> Ready -> Forwarded -> (backward) -> Ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// No pooling method set
    #[default]
    Unconfigured,
    /// Pooling method set, shapes unknown
    Configured,
    /// Output buffers allocated, argmax table is not valid
    Ready,
    /// Forward ran, argmax table is valid for one backward
    Forwarded,
}

/// Partition of the score table into bags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Rows of the score table
    pub instances: usize,
    /// Columns of the score table
    pub classes: usize,
    /// Rows of the pooled score table
    pub bags: usize,
    /// Instances per bag
    pub bag_size: usize,
}

impl Layout {
    /// Shape of the score table and of its gradient
    #[must_use]
    pub fn scores_shape(&self) -> Shape {
        [self.instances, self.classes].into()
    }

    /// Shape of pooled scores, of their gradient and of the argmax table
    #[must_use]
    pub fn pooled_shape(&self) -> Shape {
        [self.bags, self.classes].into()
    }

    /// Shape of pooled labels
    #[must_use]
    pub fn pooled_labels_shape(&self) -> Shape {
        self.bags.into()
    }
}

/// Outputs of [`MilPool::forward`], borrowed from the operator
#[derive(Debug, Clone, Copy)]
pub struct Pooled<'a, T> {
    /// Pooled scores, `bags x classes`, row-major
    pub scores: &'a [T],
    /// One label per bag
    pub labels: &'a [T],
    /// Flat index into the score table of the instance that won each pooled cell
    pub argmax: &'a [usize],
    /// Shapes of the pass
    pub layout: Layout,
}

/// Grouped max pooling for multiple instance learning.
///
/// Reduces consecutive bags of instances of a `instances x classes` score table
/// into one row of maxima per bag, propagates the bag label and remembers
/// which instance won every maximum, so that backward routes gradient
/// only to the winners.
///
/// ```rust
/// use milpool_core::{MilConfig, MilPool};
/// let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
/// pool.reshape([4, 2], [4])?;
/// let out = pool.forward(&[1., 5., 3., 2., 0., 0., 4., 1.], &[1., 1., 2., 2.])?;
/// assert_eq!(out.scores, [3., 5., 4., 1.]);
/// assert_eq!(out.labels, [1., 2.]);
/// let grad = pool.backward(&[1., 1., 1., 1.], true)?.unwrap_or_default();
/// assert_eq!(grad, [0., 1., 1., 0., 0., 0., 1., 1.]);
/// # Ok::<(), milpool_core::MilError>(())
/// ```
#[derive(Debug)]
pub struct MilPool<T: Scalar> {
    config: MilConfig,
    stage: Stage,
    layout: Option<Layout>,
    top_data: Vec<T>,
    top_label: Vec<T>,
    max_idx: Vec<usize>,
    debug: DebugMask,
}

impl<T: Scalar> Default for MilPool<T> {
    fn default() -> Self {
        Self {
            config: MilConfig::default(),
            stage: Stage::Unconfigured,
            layout: None,
            top_data: Vec::new(),
            top_label: Vec::new(),
            max_idx: Vec::new(),
            #[cfg(feature = "std")]
            debug: DebugMask::from_env(),
            #[cfg(not(feature = "std"))]
            debug: DebugMask::default(),
        }
    }
}

impl<T: Scalar> MilPool<T> {
    /// New configured operator
    #[must_use]
    pub fn new(config: MilConfig) -> Self {
        let mut pool = Self::default();
        pool.configure(config);
        pool
    }

    /// Override debug printing switches
    #[must_use]
    pub fn with_debug(mut self, debug: DebugMask) -> Self {
        self.debug = debug;
        self
    }

    /// Set pooling method and bag partition.
    /// Drops shapes and argmax table of any previous configuration.
    pub fn configure(&mut self, config: MilConfig) {
        debug_println!(
            self.debug.lifecycle(),
            "MilPool configure {} with {:?}",
            config.pool,
            config.bag_size
        );
        self.config = config;
        self.layout = None;
        self.top_data.clear();
        self.top_label.clear();
        self.max_idx.clear();
        self.stage = Stage::Configured;
    }

    /// Current config
    #[must_use]
    pub fn config(&self) -> MilConfig {
        self.config
    }

    /// Current lifecycle stage
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Layout computed by the last reshape
    #[must_use]
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Validate input shapes and allocate pooled scores, pooled labels and argmax table.
    ///
    /// Scores must have rank 2, `(instances, classes)`, labels must hold one element
    /// per instance. With fixed bags, instances must be a multiple of bag size.
    pub fn reshape(
        &mut self,
        scores_shape: impl Into<Shape>,
        labels_shape: impl Into<Shape>,
    ) -> Result<Layout, MilError> {
        if self.stage == Stage::Unconfigured {
            return Err(MilError::state_error("reshape called before configure"));
        }
        let scores_shape = scores_shape.into();
        let labels_shape = labels_shape.into();
        if scores_shape.rank() != 2 {
            return Err(MilError::shape_error(alloc::format!(
                "Input must have 2 axes, corresponding to (instances, classes), but has shape {scores_shape}"
            )));
        }
        let (instances, classes) = (scores_shape[0], scores_shape[1]);
        if labels_shape.numel() != instances {
            return Err(MilError::shape_error(alloc::format!(
                "Labels with shape {labels_shape} do not match {instances} instances"
            )));
        }
        let bag_size = match self.config.bag_size {
            BagSize::Fixed(bag_size) => {
                let bag_size = bag_size.get();
                if instances % bag_size != 0 {
                    return Err(MilError::shape_error(alloc::format!(
                        "Instance count {instances} must be integer multiple of bag size {bag_size}"
                    )));
                }
                bag_size
            }
            BagSize::WholeBatch => {
                if instances == 0 {
                    return Err(MilError::shape_error(
                        "Whole batch pooling needs at least one instance",
                    ));
                }
                instances
            }
        };
        let layout = Layout {
            instances,
            classes,
            bags: instances / bag_size,
            bag_size,
        };
        debug_println!(
            self.debug.lifecycle(),
            "MilPool reshape {scores_shape} -> pooled {}, labels {}",
            layout.pooled_shape(),
            layout.pooled_labels_shape()
        );
        let top_count = layout.bags * layout.classes;
        self.top_data = vec![T::zero(); top_count];
        self.top_label = vec![T::zero(); layout.bags];
        self.max_idx = vec![0; top_count];
        self.layout = Some(layout);
        self.stage = Stage::Ready;
        Ok(layout)
    }

    /// Pool scores and labels.
    ///
    /// With fixed bags every instance of a bag must carry the same label,
    /// otherwise [`MilError::LabelMismatch`] is returned and the outputs are undefined.
    /// With whole batch the pooled label is the label of the first instance.
    pub fn forward(&mut self, scores: &[T], labels: &[T]) -> Result<Pooled<'_, T>, MilError> {
        let layout = self.ready_layout("forward")?;
        self.implemented()?;
        if scores.len() != layout.instances * layout.classes {
            return Err(MilError::shape_error(alloc::format!(
                "Scores have {} elements, expected shape {}",
                scores.len(),
                layout.scores_shape()
            )));
        }
        if labels.len() != layout.instances {
            return Err(MilError::shape_error(alloc::format!(
                "Labels have {} elements, expected {}",
                labels.len(),
                layout.instances
            )));
        }
        let timer = Timer::start();
        // Argmax is invalid until reduction finishes
        self.stage = Stage::Ready;
        let check_labels = matches!(self.config.bag_size, BagSize::Fixed(_));
        max_reduce(
            scores,
            labels,
            &layout,
            check_labels,
            &mut self.top_data,
            &mut self.top_label,
            &mut self.max_idx,
        )?;
        self.stage = Stage::Forwarded;
        timer.finish(self.debug, "forward", &layout.scores_shape());
        debug_println!(
            self.debug.dump(),
            "MilPool pooled scores {:?}\nMilPool pooled labels {:?}\nMilPool argmax {:?}",
            self.top_data,
            self.top_label,
            self.max_idx
        );
        Ok(Pooled {
            scores: &self.top_data,
            labels: &self.top_label,
            argmax: &self.max_idx,
            layout,
        })
    }

    /// Route gradient of pooled scores back to the winning instances.
    ///
    /// Returns None if `propagate_down` is false. Labels have no gradient.
    pub fn backward(
        &mut self,
        top_grad: &[T],
        propagate_down: bool,
    ) -> Result<Option<Vec<T>>, MilError> {
        if !propagate_down {
            return Ok(None);
        }
        let layout = self.forwarded_layout()?;
        let mut bottom_grad = vec![T::zero(); layout.instances * layout.classes];
        self.backward_into(top_grad, &mut bottom_grad, true)?;
        Ok(Some(bottom_grad))
    }

    /// Same as [`MilPool::backward`], but writes into caller's buffer.
    /// Every element of `bottom_grad` is overwritten.
    pub fn backward_into(
        &mut self,
        top_grad: &[T],
        bottom_grad: &mut [T],
        propagate_down: bool,
    ) -> Result<(), MilError> {
        if !propagate_down {
            return Ok(());
        }
        let layout = self.forwarded_layout()?;
        if top_grad.len() != self.max_idx.len() {
            return Err(MilError::shape_error(alloc::format!(
                "Pooled gradient has {} elements, expected shape {}",
                top_grad.len(),
                layout.pooled_shape()
            )));
        }
        if bottom_grad.len() != layout.instances * layout.classes {
            return Err(MilError::shape_error(alloc::format!(
                "Score gradient has {} elements, expected shape {}",
                bottom_grad.len(),
                layout.scores_shape()
            )));
        }
        let timer = Timer::start();
        bottom_grad.fill(T::zero());
        // Argmax cells of one bag sit in distinct class columns, so no index repeats.
        // Should it ever repeat, the last write wins.
        for (&idx, &grad) in self.max_idx.iter().zip(top_grad) {
            bottom_grad[idx] = grad;
        }
        self.stage = Stage::Ready;
        timer.finish(self.debug, "backward", &layout.scores_shape());
        Ok(())
    }

    /// Pooled scores of the last forward
    #[must_use]
    pub fn pooled_scores(&self) -> &[T] {
        &self.top_data
    }

    /// Pooled labels of the last forward
    #[must_use]
    pub fn pooled_labels(&self) -> &[T] {
        &self.top_label
    }

    /// Argmax table of the last forward, None if there is no valid table
    #[must_use]
    pub fn argmax(&self) -> Option<&[usize]> {
        (self.stage == Stage::Forwarded).then_some(self.max_idx.as_slice())
    }

    fn implemented(&self) -> Result<(), MilError> {
        match self.config.pool {
            PoolMethod::Max => Ok(()),
            method @ (PoolMethod::Average | PoolMethod::Stochastic) => {
                Err(MilError::NotImplemented(method))
            }
        }
    }

    #[track_caller]
    fn ready_layout(&self, op: &str) -> Result<Layout, MilError> {
        match (self.stage, self.layout) {
            (Stage::Ready | Stage::Forwarded, Some(layout)) => Ok(layout),
            (stage, _) => Err(MilError::state_error(alloc::format!(
                "{op} called in stage {stage:?}, reshape first"
            ))),
        }
    }

    #[track_caller]
    fn forwarded_layout(&self) -> Result<Layout, MilError> {
        self.implemented()?;
        match (self.stage, self.layout) {
            (Stage::Forwarded, Some(layout)) => Ok(layout),
            (stage, _) => Err(MilError::state_error(alloc::format!(
                "backward called in stage {stage:?}, it needs a preceding forward"
            ))),
        }
    }
}

/// Max over consecutive bags of `layout.bag_size` instances.
///
/// Every cell starts at [`Scalar::min_value`] with argmax pointing to the first
/// instance of its bag, so the table is valid even if no score beats the seed.
/// Only strictly greater scores replace the current max, so ties keep
/// the lowest instance. The bag label is the label of its first instance.
/// With `check_labels`, every instance of a bag is compared against it before
/// the bag is reduced, and the first differing instance fails the pass,
/// whether it would win a max or not.
fn max_reduce<T: Scalar>(
    scores: &[T],
    labels: &[T],
    layout: &Layout,
    check_labels: bool,
    top_data: &mut [T],
    top_label: &mut [T],
    max_idx: &mut [usize],
) -> Result<(), MilError> {
    let Layout {
        classes, bag_size, ..
    } = *layout;
    for bag in 0..layout.bags {
        let first = bag * bag_size;
        let label = labels[first];
        if check_labels {
            if let Some(i) = (first..first + bag_size).find(|&i| labels[i] != label) {
                return Err(MilError::LabelMismatch {
                    bag,
                    instance: i,
                    expected: label.into_f64(),
                    found: labels[i].into_f64(),
                });
            }
        }
        top_label[bag] = label;
        for c in 0..classes {
            let top = bag * classes + c;
            top_data[top] = T::min_value();
            max_idx[top] = first * classes + c;
            for i in first..first + bag_size {
                let idx = i * classes + c;
                if scores[idx] > top_data[top] {
                    top_data[top] = scores[idx];
                    max_idx[top] = idx;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{MilPool, Stage};
    use crate::config::{MilConfig, PoolMethod};
    use crate::debug::DebugMask;
    use crate::error::MilError;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn lifecycle() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::default();
        assert_eq!(pool.stage(), Stage::Unconfigured);
        assert!(matches!(pool.reshape([2, 2], [2]), Err(MilError::StateError(_))));
        pool.configure(MilConfig::grouped(1));
        assert_eq!(pool.stage(), Stage::Configured);
        assert!(matches!(
            pool.forward(&[1., 2.], &[0.]),
            Err(MilError::StateError(_))
        ));
        pool.reshape([2, 2], [2])?;
        assert_eq!(pool.stage(), Stage::Ready);
        assert!(matches!(
            pool.backward(&[1., 1., 1., 1.], true),
            Err(MilError::StateError(_))
        ));
        assert!(pool.argmax().is_none());
        pool.forward(&[1., 2., 3., 4.], &[0., 1.])?;
        assert_eq!(pool.stage(), Stage::Forwarded);
        assert_eq!(pool.argmax(), Some([0, 1, 2, 3].as_slice()));
        pool.backward(&[1., 1., 1., 1.], true)?;
        assert_eq!(pool.stage(), Stage::Ready);
        assert!(matches!(
            pool.backward(&[1., 1., 1., 1.], true),
            Err(MilError::StateError(_))
        ));
        Ok(())
    }

    #[test]
    fn reconfigure_drops_shapes() -> Result<(), MilError> {
        let mut pool = MilPool::<f64>::new(MilConfig::grouped(2));
        pool.reshape([4, 1], [4])?;
        pool.forward(&[1., 2., 3., 4.], &[0., 0., 1., 1.])?;
        pool.configure(MilConfig::whole_batch());
        assert_eq!(pool.layout(), None);
        assert!(pool.argmax().is_none());
        assert!(matches!(
            pool.backward(&[1., 1.], true),
            Err(MilError::StateError(_))
        ));
        Ok(())
    }

    #[test]
    fn with_debug_keeps_config() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::new(MilConfig::grouped(2)).with_debug(DebugMask::new(7));
        assert_eq!(pool.config(), MilConfig::grouped(2));
        pool.reshape([2, 1], [2])?;
        let out = pool.forward(&[1., 2.], &[0., 0.])?;
        assert_eq!(out.scores, [2.]);
        assert_eq!(pool.backward(&[3.], true)?, Some(vec![0., 3.]));
        Ok(())
    }

    #[test]
    fn reshape_is_idempotent() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
        let a = pool.reshape([6, 3], [6])?;
        let b = pool.reshape([6, 3], [6])?;
        assert_eq!(a, b);
        assert_eq!(a.bags, 3);
        assert_eq!(pool.pooled_scores().len(), 9);
        assert_eq!(pool.pooled_labels().len(), 3);
        Ok(())
    }

    #[test]
    fn unimplemented_methods_keep_state() -> Result<(), MilError> {
        for method in [PoolMethod::Average, PoolMethod::Stochastic] {
            let mut pool = MilPool::<f32>::new(MilConfig::new(method, 2));
            pool.reshape([2, 1], [2])?;
            assert_eq!(
                pool.forward(&[1., 2.], &[0., 0.]).map(|_| ()),
                Err(MilError::NotImplemented(method))
            );
            assert_eq!(pool.stage(), Stage::Ready);
            assert_eq!(pool.pooled_scores(), [0.]);
        }
        Ok(())
    }

    #[test]
    fn buffer_lengths_are_checked() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
        pool.reshape([2, 2], [2])?;
        assert!(matches!(
            pool.forward(&[1., 2., 3.], &[0., 0.]),
            Err(MilError::ShapeError(_))
        ));
        assert!(matches!(
            pool.forward(&[1., 2., 3., 4.], &[0.]),
            Err(MilError::ShapeError(_))
        ));
        pool.forward(&[1., 2., 3., 4.], &[0., 0.])?;
        assert!(matches!(
            pool.backward(&[1.], true),
            Err(MilError::ShapeError(_))
        ));
        let mut short: Vec<f32> = vec![0.; 3];
        assert!(matches!(
            pool.backward_into(&[1., 1.], &mut short, true),
            Err(MilError::ShapeError(_))
        ));
        Ok(())
    }

    #[test]
    fn no_propagation_is_a_noop() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::new(MilConfig::whole_batch());
        // Even before reshape
        assert_eq!(pool.backward(&[], false)?, None);
        pool.reshape([2, 1], [2])?;
        pool.forward(&[1., 2.], &[0., 0.])?;
        let mut grad = vec![7f32; 2];
        pool.backward_into(&[1.], &mut grad, false)?;
        assert_eq!(grad, [7., 7.]);
        assert_eq!(pool.stage(), Stage::Forwarded);
        Ok(())
    }

    #[test]
    fn scores_below_seed_keep_first_instance() -> Result<(), MilError> {
        let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
        pool.reshape([2, 2], [2])?;
        let out = pool.forward(
            &[f32::NEG_INFINITY, f32::NAN, f32::NEG_INFINITY, f32::NAN],
            &[4., 4.],
        )?;
        assert_eq!(out.scores, [f32::NEG_INFINITY, f32::NEG_INFINITY]);
        assert_eq!(out.labels, [4.]);
        assert_eq!(out.argmax, [0, 1]);
        Ok(())
    }
}
