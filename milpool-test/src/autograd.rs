use super::{assert_eq, random_layout, random_scores};
use itertools::Itertools;
use milpool_core::{MilConfig, MilError, MilPool, Scalar};
use rand::thread_rng;

pub fn scatter<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut rng = thread_rng();
    for _ in 0..20 {
        let (bags, bag_size, classes) = random_layout(&mut rng);
        let instances = bags * bag_size;
        let scores: Vec<T> = random_scores(&mut rng, instances * classes);
        let labels = vec![T::from_f64(1.); instances];
        let mut pool = MilPool::new(MilConfig::grouped(bag_size));
        pool.reshape([instances, classes], [instances])?;
        let argmax = pool.forward(&scores, &labels)?.argmax.to_vec();
        // Every winner sits in a distinct cell
        assert_eq!(argmax.iter().unique().count(), argmax.len());
        let top_grad: Vec<T> = random_scores(&mut rng, bags * classes);
        let Some(grad) = pool.backward(&top_grad, true)? else {
            panic!("Backward with propagation returned no gradient");
        };
        let mut expected = vec![T::zero(); instances * classes];
        for (idx, g) in argmax.iter().zip(&top_grad) {
            expected[*idx] = *g;
        }
        assert_eq(grad.iter().copied(), expected);
        let mass = |x: &[T]| x.iter().map(|g| g.abs().into_f64()).sum::<f64>();
        assert_eq!(mass(&grad), mass(&top_grad));
    }
    Ok(())
}

pub fn no_propagation<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut pool = MilPool::<T>::new(MilConfig::grouped(2));
    pool.reshape([4, 1], [4])?;
    let labels = vec![T::zero(); 4];
    pool.forward(&random_scores(&mut thread_rng(), 4), &labels)?;
    assert!(pool.backward(&[T::zero(), T::zero()], false)?.is_none());
    // Argmax table stays valid for the next backward
    assert!(pool.argmax().is_some());
    assert!(pool.backward(&[T::zero(), T::zero()], true)?.is_some());
    Ok(())
}
