use crate::models::ImageRecord;
use rand::Rng;

fn weight(image: &ImageRecord) -> u64 {
    if image.favorite {
        2
    } else {
        1
    }
}

/// Draws one image from the slice, favorites carrying double weight.
/// Returns `None` only for an empty slice.
pub fn pick_weighted<'a, R: Rng>(images: &'a [ImageRecord], rng: &mut R) -> Option<&'a ImageRecord> {
    if images.is_empty() {
        return None;
    }

    let total: u64 = images.iter().map(weight).sum();
    let mut draw = rng.gen_range(0..total);

    for image in images {
        let w = weight(image);
        if draw < w {
            return Some(image);
        }
        draw -= w;
    }

    images.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn image(name: &str, favorite: bool) -> ImageRecord {
        ImageRecord {
            name: name.to_string(),
            path: name.to_string(),
            favorite,
            ..ImageRecord::default()
        }
    }

    #[test]
    fn empty_set_yields_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_weighted(&[], &mut rng).is_none());
    }

    #[test]
    fn single_image_is_always_picked() {
        let images = vec![image("only.jpg", false)];
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            assert_eq!(pick_weighted(&images, &mut rng).unwrap().name, "only.jpg");
        }
    }

    #[test]
    fn every_image_is_reachable() {
        let images: Vec<ImageRecord> =
            (0..5).map(|i| image(&format!("img{i}.jpg"), i == 0)).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(pick_weighted(&images, &mut rng).unwrap().name.clone());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn favorite_is_picked_at_two_thirds_frequency() {
        let images = vec![image("normal.jpg", false), image("favorite.jpg", true)];
        let mut rng = StdRng::seed_from_u64(42);

        let mut favorite_hits = 0usize;
        for _ in 0..1000 {
            if pick_weighted(&images, &mut rng).unwrap().favorite {
                favorite_hits += 1;
            }
        }

        // Expected 2/3; a seeded run stays well inside this band
        let frequency = favorite_hits as f64 / 1000.0;
        assert!(
            (0.60..=0.72).contains(&frequency),
            "favorite frequency {frequency} outside [0.60, 0.72]"
        );
    }
}
