use milpool_core::{MilConfig, MilError, MilPool, PoolMethod, Scalar, Stage};

pub fn stages<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut pool = MilPool::<T>::default();
    assert_eq!(pool.stage(), Stage::Unconfigured);
    pool.configure(MilConfig::grouped(3));
    assert_eq!(pool.stage(), Stage::Configured);
    if !matches!(pool.reshape([4, 2], [4]), Err(MilError::ShapeError(_))) {
        panic!("Indivisible instance count was accepted");
    }
    pool.reshape([6, 2], [6])?;
    assert_eq!(pool.stage(), Stage::Ready);
    let scores = vec![T::zero(); 12];
    let labels = vec![T::zero(); 6];
    pool.forward(&scores, &labels)?;
    assert_eq!(pool.stage(), Stage::Forwarded);
    pool.backward(&[T::zero(); 4], true)?;
    assert_eq!(pool.stage(), Stage::Ready);
    if !matches!(pool.backward(&[T::zero(); 4], true), Err(MilError::StateError(_))) {
        panic!("Backward without forward was accepted");
    }
    Ok(())
}

pub fn unimplemented_methods<T: Scalar>(_: T) -> Result<(), MilError> {
    for code in [1, 2] {
        let method = PoolMethod::try_from(code)?;
        let mut pool = MilPool::<T>::new(MilConfig::new(method, 1));
        pool.reshape([2, 2], [2])?;
        let res = pool.forward(&[T::zero(); 4], &[T::zero(); 2]).map(|_| ());
        assert_eq!(res, Err(MilError::NotImplemented(method)));
    }
    if PoolMethod::try_from(3).is_ok() {
        panic!("Unknown pooling method code was accepted");
    }
    Ok(())
}
