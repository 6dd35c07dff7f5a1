use milpool_core::{MilConfig, MilError, MilPool, PoolMethod, Shape};

const SCORES_8X3: [f32; 24] = [
    7., 6., 4., //
    2., 3., 7., //
    9., 9., 3., //
    8., 8., 7., //
    2., 3., 4., //
    2., 7., 4., //
    3., 2., 3., //
    5., 7., 8., //
];

#[test]
fn grouped_8x3() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
    let layout = pool.reshape([8, 3], [8])?;
    assert_eq!(layout.pooled_shape(), Shape::from([4, 3]));
    assert_eq!(layout.pooled_labels_shape(), Shape::from(4));
    let out = pool.forward(&SCORES_8X3, &[3., 3., 2., 2., 1., 1., 4., 4.])?;
    assert_eq!(out.scores, [7., 6., 7., 9., 9., 7., 2., 7., 4., 5., 7., 8.]);
    assert_eq!(out.labels, [3., 2., 1., 4.]);
    // Ties in bag 2 keep the lower instance
    assert_eq!(out.argmax, [0, 1, 5, 6, 7, 11, 12, 16, 14, 21, 22, 23]);
    Ok(())
}

#[test]
fn whole_batch_3x5() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::whole_batch());
    let layout = pool.reshape([3, 5], [3])?;
    assert_eq!(layout.bags, 1);
    assert_eq!(layout.bag_size, 3);
    let out = pool.forward(
        &[1., 1., 4., 5., 8., 3., 9., 10., 4., 2., 1., 7., 1., 8., 5.],
        &[3., 3., 3.],
    )?;
    assert_eq!(out.scores, [3., 9., 10., 8., 8.]);
    assert_eq!(out.labels, [3.]);
    assert_eq!(out.argmax, [5, 6, 7, 13, 4]);
    Ok(())
}

#[test]
fn whole_batch_label_is_first_instance() -> Result<(), MilError> {
    let mut pool = MilPool::<f64>::new(MilConfig::whole_batch());
    pool.reshape([3, 2], [3])?;
    // Instance 2 wins every class, its label is ignored
    let out = pool.forward(&[0., 0., 1., 1., 5., 5.], &[3., 1., 2.])?;
    assert_eq!(out.scores, [5., 5.]);
    assert_eq!(out.labels, [3.]);
    Ok(())
}

#[test]
fn label_mismatch() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
    pool.reshape([8, 3], [8])?;
    let err = pool
        .forward(&SCORES_8X3, &[3., 3., 2., 5., 1., 1., 4., 4.])
        .map(|out| out.labels.to_vec());
    assert_eq!(
        err,
        Err(MilError::LabelMismatch {
            bag: 1,
            instance: 3,
            expected: 2.,
            found: 5.,
        })
    );
    // No valid argmax after a failed forward
    assert!(pool.argmax().is_none());
    assert!(matches!(
        pool.backward(&[0.; 12], true),
        Err(MilError::StateError(_))
    ));
    // The operator recovers with valid input
    pool.forward(&SCORES_8X3, &[3., 3., 2., 2., 1., 1., 4., 4.])?;
    Ok(())
}

#[test]
fn label_mismatch_on_non_winning_instance() -> Result<(), MilError> {
    let mut pool = MilPool::<i32>::new(MilConfig::grouped(3));
    pool.reshape([3, 1], [3])?;
    assert!(matches!(
        pool.forward(&[9, 1, 2], &[0, 0, 1]),
        Err(MilError::LabelMismatch { bag: 0, instance: 2, .. })
    ));
    Ok(())
}

#[test]
fn label_mismatch_on_winning_instance() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
    pool.reshape([2, 1], [2])?;
    assert_eq!(
        pool.forward(&[1., 2.], &[3., 4.]).err(),
        Some(MilError::LabelMismatch { bag: 0, instance: 1, expected: 3., found: 4. })
    );
    Ok(())
}

#[test]
fn label_mismatch_winning_every_class() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(2));
    pool.reshape([2, 2], [2])?;
    assert_eq!(
        pool.forward(&[0., 0., 5., 5.], &[1., 2.]).err(),
        Some(MilError::LabelMismatch { bag: 0, instance: 1, expected: 1., found: 2. })
    );
    // The failed pass leaves no argmax behind.
    assert!(pool.backward(&[1., 1.], true).is_err());
    Ok(())
}

#[test]
fn deterministic()-> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(4));
    pool.reshape([8, 3], [8])?;
    let out = pool.forward(&SCORES_8X3, &[1., 1., 1., 1., 2., 2., 2., 2.])?;
    let first = (out.scores.to_vec(), out.labels.to_vec(), out.argmax.to_vec());
    let out = pool.forward(&SCORES_8X3, &[1., 1., 1., 1., 2., 2., 2., 2.])?;
    let second = (out.scores.to_vec(), out.labels.to_vec(), out.argmax.to_vec());
    assert_eq!(first, second);
    let bits: Vec<u32> = first.0.iter().map(|x| x.to_bits()).collect();
    let bits2: Vec<u32> = second.0.iter().map(|x| x.to_bits()).collect();
    assert_eq!(bits, bits2);
    Ok(())
}

#[test]
fn shapes() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::grouped(3));
    assert!(matches!(pool.reshape([8, 3], [8]), Err(MilError::ShapeError(_))));
    assert!(matches!(pool.reshape([9, 3, 1], [9]), Err(MilError::ShapeError(_))));
    assert!(matches!(pool.reshape(9, 9), Err(MilError::ShapeError(_))));
    assert!(matches!(pool.reshape([9, 3], [8]), Err(MilError::ShapeError(_))));
    // Labels may come as a column
    let layout = pool.reshape([9, 3], [9, 1])?;
    assert_eq!((layout.bags, layout.classes), (3, 3));
    let mut pool = MilPool::<f32>::new(MilConfig::whole_batch());
    assert!(matches!(pool.reshape([0, 3], [0]), Err(MilError::ShapeError(_))));
    Ok(())
}

#[test]
fn average_and_stochastic_are_not_implemented() -> Result<(), MilError> {
    let mut pool = MilPool::<f32>::new(MilConfig::new(PoolMethod::Max, 2));
    pool.reshape([2, 1], [2])?;
    pool.forward(&[1., 2.], &[1., 1.])?;
    // Switching method drops the argmax table, so backward sees the method first
    pool.configure(MilConfig::new(PoolMethod::Average, 2));
    pool.reshape([2, 1], [2])?;
    assert_eq!(
        pool.backward(&[1.], true),
        Err(MilError::NotImplemented(PoolMethod::Average))
    );
    assert_eq!(
        pool.forward(&[1., 2.], &[1., 1.]).map(|_| ()),
        Err(MilError::NotImplemented(PoolMethod::Average))
    );
    pool.configure(MilConfig::new(PoolMethod::Stochastic, 0));
    pool.reshape([2, 1], [2])?;
    assert_eq!(
        pool.forward(&[1., 2.], &[1., 1.]).map(|_| ()),
        Err(MilError::NotImplemented(PoolMethod::Stochastic))
    );
    Ok(())
}
