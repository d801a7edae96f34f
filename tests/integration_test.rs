//! Integration tests: build synthetic catalogs, cross-match them, and check
//! the result against brute-force scans and the properties the match must
//! satisfy (symmetry, monotonicity in the limit, reflexivity).

use std::collections::BTreeMap;
use std::sync::Arc;

use catmatch::crossmatch::matcher;
use catmatch::{
    angular_separation, arcsec_to_rad, rad_to_arcsec, Catalog, CatalogSide, CrossMatch,
    MatchConfig, MatchError, MatchTable, PositionSet,
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Uniformly distributed positions on the sphere, in degrees.
fn random_sky(rng: &mut StdRng, n: usize) -> (Vec<f64>, Vec<f64>) {
    (0..n)
        .map(|_| {
            let ra = rng.random::<f64>() * 360.0;
            let dec = (rng.random::<f64>() * 2.0 - 1.0).asin().to_degrees();
            (ra, dec)
        })
        .unzip()
}

/// Copy of a position list with Gaussian positional noise of `sigma_arcsec`
/// per axis.
fn perturbed(
    rng: &mut StdRng,
    ra: &[f64],
    dec: &[f64],
    sigma_arcsec: f64,
) -> (Vec<f64>, Vec<f64>) {
    let noise = Normal::new(0.0, sigma_arcsec / 3600.0).unwrap();
    ra.iter()
        .zip(dec)
        .map(|(&ra, &dec)| {
            let new_dec = (dec + noise.sample(rng)).clamp(-90.0, 90.0);
            let cos_dec = new_dec.to_radians().cos().max(1e-3);
            let new_ra = (ra + noise.sample(rng) / cos_dec).rem_euclid(360.0);
            (new_ra, new_dec)
        })
        .unzip()
}

fn positions(ra: &[f64], dec: &[f64]) -> PositionSet {
    PositionSet::from_degrees(ra, dec).unwrap()
}

/// Pairs keyed by (reference, input) with their separations.
fn pair_map(table: &MatchTable) -> BTreeMap<(usize, usize), f64> {
    table
        .pairs()
        .iter()
        .map(|p| ((p.reference_index, p.input_index), p.separation_rad))
        .collect()
}

/// Closed-form great-circle distance (Vincenty), inputs in degrees, output in arcsec.
fn great_circle_arcsec(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1, ra2, dec2) = (
        ra1.to_radians(),
        dec1.to_radians(),
        ra2.to_radians(),
        dec2.to_radians(),
    );
    let dra = ra2 - ra1;
    let num1 = dec2.cos() * dra.sin();
    let num2 = dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();
    rad_to_arcsec((num1 * num1 + num2 * num2).sqrt().atan2(den))
}

#[test]
fn test_two_entry_reference_scenario() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let reference = Catalog::from_positions(vec![10.0, 100.0], vec![20.0, -50.0]).unwrap();
    let input = Catalog::from_positions(vec![10.0003], vec![20.0]).unwrap();
    let expected_arcsec = great_circle_arcsec(10.0, 20.0, 10.0003, 20.0);
    println!("Closed-form separation: {:.6}\"", expected_arcsec);

    // 0.0003 deg of RA at dec 20 is ~1.015", just outside the default 1" limit.
    assert!(expected_arcsec > 1.0 && expected_arcsec < 1.08);

    let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::default());
    let table = session.run_match().unwrap();
    assert!(table.is_empty(), "1\" limit must reject a {expected_arcsec}\" pair");

    let table = session.run_match_with_limit(2.0).unwrap();
    assert_eq!(table.len(), 1);
    let pair = table.pairs()[0];
    assert_eq!((pair.reference_index, pair.input_index), (0, 0));
    assert!(
        (pair.separation_arcsec() - expected_arcsec).abs() < 1e-6,
        "index separation {} vs closed form {}",
        pair.separation_arcsec(),
        expected_arcsec
    );
    assert!(table.pairs().iter().all(|p| p.reference_index != 1));

    let resolution = session.matched_input_for(&[0, 1]).unwrap();
    assert_eq!(resolution.counterparts(), vec![Some(0), None]);
    assert!(resolution.notice().is_none());

    let joined = session.matched_entries(&["ra", "dec"]).unwrap();
    assert_eq!(joined.reference_index(), &[0]);
    assert_eq!(joined.column("catin_ra"), Some(&[10.0003][..]));
}

#[test]
fn test_matcher_agrees_with_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    // Clustered input: half are noisy copies of reference points.
    let (ref_ra, ref_dec) = random_sky(&mut rng, 2000);
    let (mut in_ra, mut in_dec) = perturbed(&mut rng, &ref_ra[..1000], &ref_dec[..1000], 20.0);
    let (extra_ra, extra_dec) = random_sky(&mut rng, 1000);
    in_ra.extend(extra_ra);
    in_dec.extend(extra_dec);

    let reference = positions(&ref_ra, &ref_dec);
    let input = Arc::new(positions(&in_ra, &in_dec));
    let limit = arcsec_to_rad(30.0);

    let table = matcher::run(&reference, input.clone(), limit);

    let mut expected = BTreeMap::new();
    for (i, r) in reference.uvecs().iter().enumerate() {
        for (j, v) in input.uvecs().iter().enumerate() {
            let sep = angular_separation(r, v);
            if sep <= limit {
                expected.insert((i, j), sep);
            }
        }
    }

    println!("Brute force found {} pairs", expected.len());
    assert!(expected.len() > 500);
    assert_eq!(pair_map(&table), expected);
}

#[test]
fn test_match_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(7);
    let (a_ra, a_dec) = random_sky(&mut rng, 3000);
    let (mut b_ra, mut b_dec) = perturbed(&mut rng, &a_ra, &a_dec, 0.5);
    let (extra_ra, extra_dec) = random_sky(&mut rng, 1000);
    b_ra.extend(extra_ra);
    b_dec.extend(extra_dec);

    let a = Arc::new(positions(&a_ra, &a_dec));
    let b = Arc::new(positions(&b_ra, &b_dec));
    let limit = arcsec_to_rad(1.0);

    let ab = matcher::run(&a, b.clone(), limit);
    let ba = matcher::run(&b, a.clone(), limit);

    let forward = pair_map(&ab);
    let backward: BTreeMap<(usize, usize), f64> = ba
        .pairs()
        .iter()
        .map(|p| ((p.input_index, p.reference_index), p.separation_rad))
        .collect();

    assert!(forward.len() > 2300);
    assert_eq!(
        forward.keys().collect::<Vec<_>>(),
        backward.keys().collect::<Vec<_>>()
    );
    for (key, sep) in &forward {
        assert!((sep - backward[key]).abs() < 1e-15);
    }
}

#[test]
fn test_pairs_grow_monotonically_with_limit() {
    let mut rng = StdRng::seed_from_u64(99);
    let (ref_ra, ref_dec) = random_sky(&mut rng, 2000);
    let (in_ra, in_dec) = perturbed(&mut rng, &ref_ra, &ref_dec, 2.0);
    let reference = positions(&ref_ra, &ref_dec);
    let input = Arc::new(positions(&in_ra, &in_dec));

    let mut previous = BTreeMap::new();
    for limit_arcsec in [0.0, 0.5, 1.0, 2.0, 4.0, 8.0] {
        let table = matcher::run(&reference, input.clone(), arcsec_to_rad(limit_arcsec));
        let current = pair_map(&table);
        for (key, sep) in &previous {
            assert_eq!(current.get(key), Some(sep), "pair {key:?} lost at {limit_arcsec}\"");
        }
        assert!(current.len() >= previous.len());
        previous = current;
    }
    assert!(previous.len() > 1900);
}

#[test]
fn test_catalog_matches_itself() {
    let mut rng = StdRng::seed_from_u64(2024);
    let (ra, dec) = random_sky(&mut rng, 5000);
    let catalog = Catalog::from_positions(ra, dec).unwrap();

    let mut session =
        CrossMatch::from_catalogs(catalog.clone(), catalog, MatchConfig::new(60.0));
    let table = session.run_match().unwrap();

    for i in 0..table.num_reference() {
        let own = table
            .pairs_for_reference(i)
            .find(|p| p.input_index == i)
            .expect("every entry matches itself");
        assert_eq!(own.separation_rad, 0.0);
    }

    let all: Vec<usize> = (0..5000).collect();
    let resolution = session.matched_input_for(&all).unwrap();
    assert_eq!(
        resolution.counterparts(),
        all.iter().map(|&i| Some(i)).collect::<Vec<_>>()
    );
    let resolution = session.matched_reference_for(&all).unwrap();
    assert_eq!(resolution.num_matched(), 5000);
}

#[test]
fn test_tens_of_thousands_of_entries() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let mut rng = StdRng::seed_from_u64(123);
    let n = 30_000;
    let (ref_ra, ref_dec) = random_sky(&mut rng, n);
    let (in_ra, in_dec) = perturbed(&mut rng, &ref_ra, &ref_dec, 0.3);

    let reference = Catalog::from_columns([
        ("ra", ref_ra),
        ("dec", ref_dec),
        ("mag", (0..n).map(|i| 12.0 + (i % 100) as f64 * 0.05).collect()),
    ])
    .unwrap();
    let input = Catalog::from_columns([
        ("ra", in_ra),
        ("dec", in_dec),
        ("mag", (0..n).map(|i| 12.01 + (i % 100) as f64 * 0.05).collect()),
    ])
    .unwrap();

    let start = std::time::Instant::now();
    let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::default());
    let num_pairs = session.run_match().unwrap().len();
    println!(
        "Matched {} x {} in {:.1} ms: {} pairs",
        n,
        n,
        start.elapsed().as_secs_f64() * 1000.0,
        num_pairs
    );

    let joined = session.matched_entries(&["mag"]).unwrap();
    let correct = joined
        .reference_index()
        .iter()
        .zip(joined.input_index())
        .filter(|(r, i)| r == i)
        .count();
    // Rayleigh tail beyond 1" with 0.3" per-axis noise is ~0.4%.
    assert!(correct as f64 > 0.98 * n as f64, "only {correct} true matches");
    assert!(joined.separation_arcsec().iter().all(|&s| s <= 1.0));

    let catin_mag = joined.column("catin_mag").unwrap();
    let catref_mag = joined.column("catref_mag").unwrap();
    for (row, (r, i)) in joined
        .reference_index()
        .iter()
        .zip(joined.input_index())
        .enumerate()
    {
        if r == i {
            assert!((catin_mag[row] - catref_mag[row] - 0.01).abs() < 1e-9);
        }
    }
}

#[test]
fn test_ambiguous_matches_keep_nearest() {
    // Two input sources straddle one reference source.
    let reference = Catalog::from_positions(vec![150.0, 151.0], vec![2.0, 2.0]).unwrap();
    let input = Catalog::from_positions(
        vec![150.0, 150.0, 151.0],
        vec![2.0 + 0.8 / 3600.0, 2.0 - 0.3 / 3600.0, 2.0],
    )
    .unwrap();

    let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::default());
    assert_eq!(session.run_match().unwrap().len(), 3);

    let resolution = session.matched_input_for(&[0, 1]).unwrap();
    assert_eq!(resolution.counterparts(), vec![Some(1), Some(2)]);
    let notice = resolution.notice().expect("reference 0 had two candidates");
    assert_eq!(notice.collapsed, 1);

    // Input-side lookups are independent and unambiguous here.
    let resolution = session.matched_reference_for(&[0, 1, 2]).unwrap();
    assert_eq!(resolution.counterparts(), vec![Some(0), Some(0), Some(1)]);
    assert!(resolution.notice().is_none());

    let joined = session.matched_entries::<&str>(&[]).unwrap();
    assert_eq!(joined.num_rows(), 2);
    assert_eq!(joined.input_index(), &[1, 2]);
    assert_eq!(joined.collapsed(), 1);
}

#[test]
fn test_unmatched_reference_rows_are_dropped_from_join() {
    let reference = Catalog::from_columns([
        ("ra", vec![0.0, 90.0, 180.0]),
        ("dec", vec![0.0, 0.0, 0.0]),
        ("flux", vec![1.0, 2.0, 3.0]),
    ])
    .unwrap();
    let input = Catalog::from_columns([
        ("ra", vec![180.0, 0.0]),
        ("dec", vec![0.0, 0.0]),
        ("flux", vec![30.0, 10.0]),
    ])
    .unwrap();

    let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::default());
    session.run_match().unwrap();

    let resolution = session.matched_input_for(&[1]).unwrap();
    assert_eq!(resolution.counterpart(0), None);

    let joined = session.matched_entries(&["flux"]).unwrap();
    assert_eq!(joined.reference_index(), &[0, 2]);
    assert_eq!(joined.input_index(), &[1, 0]);
    assert_eq!(joined.column("catref_flux"), Some(&[1.0, 3.0][..]));
    assert_eq!(joined.column("catin_flux"), Some(&[10.0, 30.0][..]));
}

#[test]
fn test_unknown_projection_column() {
    let reference = Catalog::from_columns([
        ("ra", vec![0.0]),
        ("dec", vec![0.0]),
        ("sigmag", vec![0.02]),
    ])
    .unwrap();
    let input = Catalog::from_positions(vec![0.0], vec![0.0]).unwrap();

    let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::default());
    session.run_match().unwrap();
    let err = session.matched_entries(&["sigmag"]).unwrap_err();
    assert_eq!(
        err,
        MatchError::UnknownColumn {
            column: "sigmag".to_string(),
            side: CatalogSide::Input,
        }
    );
}

#[test]
fn test_match_table_bytes_restore_queries() {
    let mut rng = StdRng::seed_from_u64(5);
    let (ra, dec) = random_sky(&mut rng, 500);
    let (in_ra, in_dec) = perturbed(&mut rng, &ra, &dec, 1.0);
    let table = matcher::run(
        &positions(&ra, &dec),
        Arc::new(positions(&in_ra, &in_dec)),
        arcsec_to_rad(5.0),
    );

    let bytes = table.to_rkyv_bytes().unwrap();
    let restored = MatchTable::from_rkyv_bytes(&bytes).unwrap();
    assert_eq!(restored, table);

    let keys: Vec<usize> = (0..500).collect();
    assert_eq!(
        restored.resolve_input_for(&keys),
        table.resolve_input_for(&keys)
    );
}
