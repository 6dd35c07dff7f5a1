use super::{assert_eq, random_layout, random_scores};
use itertools::iproduct;
use milpool_core::{MilConfig, MilError, MilPool, Scalar};
use rand::{thread_rng, Rng};

/// Naive max over bags, ties keep the lowest instance
fn reduce_op<T: Scalar>(
    scores: &[T],
    bags: usize,
    bag_size: usize,
    classes: usize,
) -> (Vec<T>, Vec<usize>) {
    iproduct!(0..bags, 0..classes)
        .map(|(b, c)| {
            (b * bag_size..(b + 1) * bag_size)
                .map(|i| (scores[i * classes + c], i * classes + c))
                .reduce(|acc, x| if x.0 > acc.0 { x } else { acc })
                .unwrap()
        })
        .unzip()
}

pub fn grouped_max<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut rng = thread_rng();
    for _ in 0..20 {
        let (bags, bag_size, classes) = random_layout(&mut rng);
        let instances = bags * bag_size;
        let scores: Vec<T> = random_scores(&mut rng, instances * classes);
        let bag_labels: Vec<T> = (0..bags)
            .map(|_| T::from_f64(rng.gen_range(0..10) as f64))
            .collect();
        let labels: Vec<T> = bag_labels
            .iter()
            .flat_map(|l| std::iter::repeat(*l).take(bag_size))
            .collect();
        let mut pool = MilPool::new(MilConfig::grouped(bag_size));
        let layout = pool.reshape([instances, classes], [instances])?;
        assert_eq!(layout.bags, bags);
        let out = pool.forward(&scores, &labels)?;
        let (max, argmax) = reduce_op(&scores, bags, bag_size, classes);
        assert_eq(out.scores.iter().copied(), max);
        assert_eq!(out.argmax, argmax.as_slice());
        assert_eq(out.labels.iter().copied(), bag_labels);
    }
    Ok(())
}

pub fn whole_batch_max<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut rng = thread_rng();
    for _ in 0..20 {
        let (_, instances, classes) = random_layout(&mut rng);
        let scores: Vec<T> = random_scores(&mut rng, instances * classes);
        // Labels may differ, pooled label is always the first one
        let labels: Vec<T> = (0..instances)
            .map(|_| T::from_f64(rng.gen_range(0..10) as f64))
            .collect();
        let mut pool = MilPool::new(MilConfig::whole_batch());
        pool.reshape([instances, classes], [instances])?;
        let out = pool.forward(&scores, &labels)?;
        let (max, argmax) = reduce_op(&scores, 1, instances, classes);
        assert_eq(out.scores.iter().copied(), max);
        assert_eq!(out.argmax, argmax.as_slice());
        assert_eq(out.labels.iter().copied(), [labels[0]]);
    }
    Ok(())
}

/// Every instance in turn carries a wrong label, once winning only the first class
/// and once winning every class
pub fn label_mismatch<T: Scalar>(_: T) -> Result<(), MilError> {
    for (bags, bag_size, classes) in [(1, 2, 1), (3, 4, 5), (5, 3, 2)] {
        let instances = bags * bag_size;
        for (bad, wins_all) in iproduct!(0..instances, [false, true]) {
            let winning = if wins_all { classes } else { 1 };
            let scores: Vec<T> = iproduct!(0..instances, 0..classes)
                .map(|(i, c)| {
                    if i == bad && c < winning {
                        T::from_f64(10.)
                    } else {
                        T::from_f64(((i * 7 + c * 3) % 5) as f64)
                    }
                })
                .collect();
            let mut labels: Vec<T> = (0..instances)
                .map(|i| T::from_f64((i / bag_size) as f64))
                .collect();
            labels[bad] = T::from_f64(-1.);
            let bad_bag = bad / bag_size;
            // With the first instance mislabeled, the second one is reported
            let reported = if bad % bag_size == 0 { bad + 1 } else { bad };
            let mut pool = MilPool::new(MilConfig::grouped(bag_size));
            pool.reshape([instances, classes], [instances])?;
            match pool.forward(&scores, &labels) {
                Err(MilError::LabelMismatch { bag, instance, .. }) => {
                    assert_eq!((bag, instance), (bad_bag, reported));
                }
                Err(err) => return Err(err),
                Ok(_) => panic!("Mislabeled instance {bad} in bag {bad_bag} was not detected"),
            }
        }
    }
    Ok(())
}

pub fn deterministic<T: Scalar>(_: T) -> Result<(), MilError> {
    let mut rng = thread_rng();
    let (bags, bag_size, classes) = random_layout(&mut rng);
    let instances = bags * bag_size;
    let scores: Vec<T> = random_scores(&mut rng, instances * classes);
    let labels = vec![T::zero(); instances];
    let mut pool = MilPool::new(MilConfig::grouped(bag_size));
    pool.reshape([instances, classes], [instances])?;
    let out = pool.forward(&scores, &labels)?;
    let first = (out.scores.to_vec(), out.labels.to_vec(), out.argmax.to_vec());
    let out = pool.forward(&scores, &labels)?;
    assert_eq!(out.argmax, first.2.as_slice());
    assert!(out.scores.iter().zip(&first.0).all(|(x, y)| x == y));
    assert!(out.labels.iter().zip(&first.1).all(|(x, y)| x == y));
    Ok(())
}
