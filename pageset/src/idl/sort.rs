//! Descending sort for identifier lists
//!
//! Quicksort with a median-of-three pivot, finishing small partitions with an insertion sort.
//! Pending partitions are kept on a fixed stack rather than recursing. The larger half of each
//! split is the one pushed, so the stack never holds more than log2(n) entries.

use crate::Id;

/// Partitions with at most this many elements (plus one) are insertion sorted.
pub(crate) const SMALL: usize = 8;

const STACK_DEPTH: usize = usize::BITS as usize;

/// Sort `ids` into strictly descending order (for duplicate free input) without allocating.
pub(crate) fn sort_descending(ids: &mut [Id]) {
    if ids.len() < 2 {
        return;
    }

    let mut stack = [(0usize, 0usize); STACK_DEPTH];
    let mut top = 0;

    let mut l = 0;
    let mut ir = ids.len() - 1;

    loop {
        if ir - l < SMALL {
            insertion_sort(ids, l, ir);
            if top == 0 {
                break;
            }
            top -= 1;
            (l, ir) = stack[top];
        } else {
            // Median of left, centre and right. Afterwards ids[l] >= ids[l + 1] >= ids[ir],
            // which bounds both partition scans.
            let k = (l + ir) >> 1;
            ids.swap(k, l + 1);
            if ids[l] < ids[ir] {
                ids.swap(l, ir);
            }
            if ids[l + 1] < ids[ir] {
                ids.swap(l + 1, ir);
            }
            if ids[l] < ids[l + 1] {
                ids.swap(l, l + 1);
            }

            let pivot = ids[l + 1];
            let mut i = l + 1;
            let mut j = ir;
            loop {
                i += 1;
                while ids[i] > pivot {
                    i += 1;
                }
                j -= 1;
                while ids[j] < pivot {
                    j -= 1;
                }
                if j < i {
                    break;
                }
                ids.swap(i, j);
            }
            ids[l + 1] = ids[j];
            ids[j] = pivot;

            // Push the larger partition, carry on with the smaller one
            if ir - i + 1 >= j - l {
                stack[top] = (i, ir);
                ir = j - 1;
            } else {
                stack[top] = (l, j - 1);
                l = i;
            }
            top += 1;
        }
    }
}

fn insertion_sort(ids: &mut [Id], l: usize, ir: usize) {
    for j in l + 1..=ir {
        let a = ids[j];
        let mut i = j;
        while i > l && ids[i - 1] < a {
            ids[i] = ids[i - 1];
            i -= 1;
        }
        ids[i] = a;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::seq::SliceRandom;
    use rand::Rng;

    fn reference(ids: &[Id]) -> Vec<Id> {
        let mut expected = ids.to_vec();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected
    }

    fn check(mut ids: Vec<Id>) {
        let expected = reference(&ids);
        sort_descending(&mut ids);
        assert_eq!(ids, expected);
    }

    #[test]
    fn it_sorts_trivial_lists() {
        check(vec![]);
        check(vec![42]);
        check(vec![1, 2]);
        check(vec![2, 1]);
    }

    #[test]
    fn it_sorts_around_the_insertion_threshold() {
        for len in [SMALL - 1, SMALL, SMALL + 1, SMALL + 2, 2 * SMALL + 1] {
            let ascending: Vec<Id> = (0..len as Id).collect();
            check(ascending.clone());
            check(ascending.into_iter().rev().collect());
        }
    }

    #[test]
    fn it_sorts_adversarial_inputs() {
        let len = 5_000;
        check((0..len).collect());
        check((0..len).rev().collect());
        // All equal but one
        let mut same = vec![7; len as usize];
        same[len as usize / 2] = 9;
        check(same);
        // Organ pipe
        check((0..len / 2).chain((0..len / 2).rev()).collect());
        // Sawtooth
        check((0..len).map(|i| i % 17).collect());
    }

    #[test]
    fn it_sorts_random_inputs() {
        let mut rng = rand::thread_rng();
        for len in [0, 1, 7, 8, 9, 100, 1_001, 20_000] {
            let mut ids: Vec<Id> = (0..len as Id).map(|i| i * 3 + 1).collect();
            ids.shuffle(&mut rng);
            check(ids);
            let ids: Vec<Id> = (0..len).map(|_| rng.gen_range(0..1_000)).collect();
            check(ids);
        }
    }

    #[test]
    fn it_sorts_extreme_values() {
        check(vec![Id::MAX, 0, Id::MAX - 1, 1, Id::MAX / 2, 3, 5, 8, 13, 21, 34]);
    }
}
