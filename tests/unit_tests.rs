//! Unit tests for the gxsmread preprocessing stages
//!
//! These tests build gxsm-shaped datasets in memory and exercise each
//! stage of the pipeline on its own and together.

use gxsmread::{
    channel_config::{
        ChannelConfig, ChannelConfigTable, ChannelEntry, ConversionSource, ResolveOptions,
    },
    dataset::{AttrValue, Dataset, Variable},
    errors::{GxsmError, Result},
    metadata::{describe_variable, list_variables_and_dimensions, print_metadata},
    parallel::{get_parallel_info, ParallelConfig},
    preprocess::{
        channel_from_source, clean_up_metadata, convert_floatfield, is_gxsm_file, preprocess,
        validate_gxsm_file, PreprocessOptions,
    },
};
use ndarray::ArrayD;
use std::path::Path;

const CURRENT_GAIN: &str = "sranger_mk2_hwi_XSM_Inst_nAmpere2V";

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12,
        "expected {}, got {}",
        expected,
        actual
    );
}

/// A small gxsm scan: 2 rows x 3 columns, counts 1..=6, dz = 0.5
fn gxsm_dataset() -> Result<Dataset> {
    let mut ds = Dataset::new();
    ds.set_attr("Creator", "gxsm 3.51.0");
    ds.set_attr("title", "test scan");

    ds.add_dimension("time", 1)?;
    ds.add_dimension("value", 1)?;
    ds.add_dimension("dimy", 2)?;
    ds.add_dimension("dimx", 3)?;

    let counts = ArrayD::from_shape_vec(vec![1, 1, 2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    ds.insert_variable(
        "FloatField",
        Variable::numeric(vec!["time", "value", "dimy", "dimx"], counts)
            .with_attr("var_unit", "V"),
    )?;
    ds.insert_variable(
        "dz",
        Variable::scalar(0.5)
            .with_attr("var_unit", "Ang")
            .with_attr("long_name", "DAC to Z conversion"),
    )?;

    ds.insert_variable(
        "dimx",
        Variable::numeric(vec!["dimx"], ArrayD::from_shape_vec(vec![3], vec![0.0, 1.0, 2.0])?),
    )?;
    ds.insert_variable(
        "dimy",
        Variable::numeric(vec!["dimy"], ArrayD::from_shape_vec(vec![2], vec![0.0, 10.0])?),
    )?;
    ds.insert_variable(
        "time",
        Variable::numeric(vec!["time"], ArrayD::from_shape_vec(vec![1], vec![42.0])?),
    )?;

    ds.insert_variable("basename", Variable::text("/data/sample001.nc"))?;
    ds.insert_variable(
        CURRENT_GAIN,
        Variable::scalar(0.1).with_attr("var_unit", "nA/V"),
    )?;

    Ok(ds)
}

fn table_with(channel: &str, entry: ChannelEntry) -> ChannelConfigTable {
    let mut table = ChannelConfigTable::new();
    table.insert(channel, entry);
    table
}

#[test]
fn test_error_types() {
    let err = GxsmError::NotGxsmFile {
        creator: Some("Nanonis".to_string()),
    };
    assert!(format!("{}", err).contains("Nanonis"));

    let err = GxsmError::NotGxsmFile { creator: None };
    assert!(format!("{}", err).contains("no Creator attribute"));

    let var_err = GxsmError::VariableNotFound {
        var: "FloatField".to_string(),
    };
    assert!(format!("{}", var_err).contains("Variable 'FloatField' not found"));

    let cfg_err = GxsmError::ChannelConfig {
        channel: "ADC3".to_string(),
        message: "missing".to_string(),
    };
    assert!(format!("{}", cfg_err).contains("channel 'ADC3'"));

    let generic_err = GxsmError::Generic("Test error".to_string());
    assert_eq!(format!("{}", generic_err), "Test error");
}

#[test]
fn test_format_check() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    assert!(is_gxsm_file(&ds));
    assert!(validate_gxsm_file(&ds).is_ok());

    // Case-insensitive substring match
    ds.set_attr("Creator", "GXSM-3 build 2024");
    assert!(is_gxsm_file(&ds));

    ds.set_attr("Creator", "Nanonis");
    assert!(!is_gxsm_file(&ds));
    match validate_gxsm_file(&ds) {
        Err(GxsmError::NotGxsmFile { creator }) => assert_eq!(creator.as_deref(), Some("Nanonis")),
        _ => panic!("Expected NotGxsmFile error"),
    }

    // Non-string creator is not a gxsm file, and not a panic
    ds.set_attr("Creator", 3.0);
    assert!(!is_gxsm_file(&ds));

    // Missing creator
    let empty = Dataset::new();
    assert!(!is_gxsm_file(&empty));
    match validate_gxsm_file(&empty) {
        Err(GxsmError::NotGxsmFile { creator }) => assert!(creator.is_none()),
        _ => panic!("Expected NotGxsmFile error"),
    }

    Ok(())
}

#[test]
fn test_dataset_invariants() -> Result<()> {
    let mut ds = gxsm_dataset()?;

    // Unknown dimension
    let bad = Variable::numeric(vec!["nope"], ArrayD::zeros(vec![3]));
    assert!(matches!(
        ds.insert_variable("bad", bad),
        Err(GxsmError::DimensionNotFound { .. })
    ));

    // Wrong length along a known dimension
    let bad = Variable::numeric(vec!["dimx"], ArrayD::zeros(vec![4]));
    assert!(matches!(
        ds.insert_variable("bad", bad),
        Err(GxsmError::ShapeMismatch { .. })
    ));

    // Redefining a dimension with a different length
    assert!(ds.add_dimension("dimx", 5).is_err());
    assert!(ds.add_dimension("dimx", 3).is_ok());

    // Dimension still in use
    assert!(ds.remove_dimension("dimx").is_err());

    assert!(ds.is_coordinate("dimx"));
    assert!(ds.is_coordinate("time"));
    assert!(!ds.is_coordinate("FloatField"));
    let data_vars = ds.data_var_names();
    assert!(data_vars.contains(&"FloatField".to_string()));
    assert!(!data_vars.contains(&"dimx".to_string()));

    Ok(())
}

#[test]
fn test_variable_to_attr_value() -> Result<()> {
    assert_eq!(Variable::scalar(2.5).to_attr_value(), AttrValue::Double(2.5));
    assert_eq!(
        Variable::text("hello").to_attr_value(),
        AttrValue::Str("hello".to_string())
    );

    let single = Variable::numeric(vec!["a"], ArrayD::from_shape_vec(vec![1], vec![7.0])?);
    assert_eq!(single.to_attr_value(), AttrValue::Double(7.0));

    let grid = Variable::numeric(
        vec!["a", "b"],
        ArrayD::from_shape_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])?,
    );
    assert_eq!(
        grid.to_attr_value(),
        AttrValue::Doubles(vec![1.0, 2.0, 3.0, 4.0])
    );

    Ok(())
}

#[test]
fn test_resolve_raw_units() -> Result<()> {
    let ds = gxsm_dataset()?;
    let table = table_with(
        "Current",
        ChannelEntry {
            name: Some("tunnel_current".to_string()),
            conversion_factor: Some(10.0),
            units: Some("pA".to_string()),
        },
    );
    let options = ResolveOptions {
        use_physical_units: false,
        allow_convert_from_metadata: true,
    };

    let config = ChannelConfig::resolve("Current", Some(&table), &ds, options)?;
    assert_eq!(config.name, "tunnel_current");
    assert_eq!(config.conversion_factor, 1.0);
    assert_eq!(config.units, "raw");
    assert_eq!(config.source, ConversionSource::Raw);

    // Raw mode never needs a table
    let config = ChannelConfig::resolve("ADC5", None, &ds, options)?;
    assert_eq!(config.name, "ADC5");
    assert_eq!(config.units, "raw");

    Ok(())
}

#[test]
fn test_resolve_from_table() -> Result<()> {
    let ds = gxsm_dataset()?;
    let table = table_with(
        "Current",
        ChannelEntry {
            name: None,
            conversion_factor: Some(10.0),
            units: Some("pA".to_string()),
        },
    );

    let config = ChannelConfig::resolve("Current", Some(&table), &ds, ResolveOptions::default())?;
    assert_eq!(config.name, "Current");
    assert_eq!(config.conversion_factor, 10.0);
    assert_eq!(config.units, "pA");
    assert_eq!(config.source, ConversionSource::Table);

    Ok(())
}

#[test]
fn test_resolve_topography_is_inherent() -> Result<()> {
    let ds = gxsm_dataset()?;
    let options = ResolveOptions {
        use_physical_units: true,
        allow_convert_from_metadata: false,
    };

    let config = ChannelConfig::resolve("Topo", None, &ds, options)?;
    assert_eq!(config.conversion_factor, 1.0);
    assert_eq!(config.units, "Ang");
    assert_eq!(config.source, ConversionSource::Inherent);

    // Without a var_unit on dz the default unit is used
    let mut ds = gxsm_dataset()?;
    ds.insert_variable("dz", Variable::scalar(0.5))?;
    let config = ChannelConfig::resolve("topo", None, &ds, options)?;
    assert_eq!(config.units, "Å");

    Ok(())
}

#[test]
fn test_resolve_metadata_fallback() -> Result<()> {
    let ds = gxsm_dataset()?;

    let config = ChannelConfig::resolve("ADC2-Current", None, &ds, ResolveOptions::default())?;
    assert_close(config.conversion_factor, 0.1);
    assert_eq!(config.units, "nA");
    assert_eq!(config.source, ConversionSource::Metadata);

    // An incomplete table entry still falls back, keeping its name
    let table = table_with(
        "ADC2-Current",
        ChannelEntry {
            name: Some("current".to_string()),
            conversion_factor: Some(3.0),
            units: None,
        },
    );
    let config =
        ChannelConfig::resolve("ADC2-Current", Some(&table), &ds, ResolveOptions::default())?;
    assert_eq!(config.name, "current");
    assert_eq!(config.source, ConversionSource::Metadata);

    // Fallback disabled
    let no_metadata = ResolveOptions {
        use_physical_units: true,
        allow_convert_from_metadata: false,
    };
    match ChannelConfig::resolve("ADC2-Current", None, &ds, no_metadata) {
        Err(GxsmError::ChannelConfig { channel, message }) => {
            assert_eq!(channel, "ADC2-Current");
            assert!(message.contains("metadata conversion disabled"));
        }
        _ => panic!("Expected ChannelConfig error"),
    }

    // Known quantity but gain absent from the file
    let mut ds = gxsm_dataset()?;
    ds.remove_variable(CURRENT_GAIN);
    assert!(ChannelConfig::resolve("Current", None, &ds, ResolveOptions::default()).is_err());

    // Unknown channel
    let ds = gxsm_dataset()?;
    assert!(ChannelConfig::resolve("ADC7", None, &ds, ResolveOptions::default()).is_err());

    Ok(())
}

#[test]
fn test_resolve_rejects_bad_metadata_gain() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    ds.insert_variable(CURRENT_GAIN, Variable::text("0.1"))?;
    match ChannelConfig::resolve("Current", None, &ds, ResolveOptions::default()) {
        Err(GxsmError::InvalidData { var, .. }) => assert_eq!(var, CURRENT_GAIN),
        _ => panic!("Expected InvalidData error"),
    }
    Ok(())
}

#[test]
fn test_channel_table_json() -> Result<()> {
    let table = ChannelConfigTable::from_json_str(
        r#"{
            "Topo": {"name": "height", "conversion_factor": 1.0, "units": "Å"},
            "ADC2-Current": {"conversion_factor": 0.01, "units": "nA"},
            "ADC3": {}
        }"#,
    )?;
    assert_eq!(table.len(), 3);

    let topo = table.get("Topo").expect("Topo entry");
    assert_eq!(topo.name.as_deref(), Some("height"));
    assert_eq!(topo.units.as_deref(), Some("Å"));

    let adc3 = table.get("ADC3").expect("ADC3 entry");
    assert_eq!(adc3, &ChannelEntry::default());

    // Unknown fields are rejected
    let bad = ChannelConfigTable::from_json_str(r#"{"Topo": {"factor": 2.0}}"#);
    assert!(matches!(bad, Err(GxsmError::ConfigParse(_))));

    // Not an object
    assert!(ChannelConfigTable::from_json_str("[1, 2]").is_err());

    Ok(())
}

#[test]
fn test_convert_floatfield() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    let config = ChannelConfig {
        name: "current".to_string(),
        conversion_factor: 2.0,
        units: "nA".to_string(),
        source: ConversionSource::Table,
    };

    convert_floatfield(&mut ds, &config)?;

    assert!(!ds.contains_variable("FloatField"));
    assert!(!ds.contains_variable("dz"));

    let var = ds.require_variable("current")?;
    assert_eq!(var.dims, vec!["dimy", "dimx"]);
    assert_eq!(var.units(), Some("nA"));

    let data = var.as_numeric().expect("numeric data");
    assert_eq!(data.shape(), &[2, 3]);
    // count * dz(0.5) * 2.0 == count
    assert_close(data[[0, 0]], 1.0);
    assert_close(data[[0, 2]], 3.0);
    assert_close(data[[1, 2]], 6.0);

    // Metadata untouched by conversion
    assert!(ds.contains_variable("basename"));
    assert!(ds.contains_variable("time"));

    Ok(())
}

#[test]
fn test_convert_per_pixel_differential() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    let dz = ArrayD::from_shape_vec(vec![1, 1, 2, 3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0])?;
    ds.insert_variable(
        "dz",
        Variable::numeric(vec!["time", "value", "dimy", "dimx"], dz),
    )?;

    let config = ChannelConfig {
        name: "Topo".to_string(),
        conversion_factor: 1.0,
        units: "Ang".to_string(),
        source: ConversionSource::Inherent,
    };
    convert_floatfield(&mut ds, &config)?;

    let data = ds
        .require_variable("Topo")?
        .as_numeric()
        .expect("numeric data")
        .clone();
    assert_close(data[[0, 0]], 1.0);
    assert_close(data[[1, 0]], 8.0);
    assert_close(data[[1, 2]], 12.0);

    Ok(())
}

#[test]
fn test_convert_replaces_variable_of_same_name() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    let config = ChannelConfig {
        name: "basename".to_string(),
        conversion_factor: 1.0,
        units: "V".to_string(),
        source: ConversionSource::Table,
    };

    convert_floatfield(&mut ds, &config)?;

    let var = ds.require_variable("basename")?;
    assert!(var.as_text().is_none());
    assert_eq!(var.dims, vec!["dimy", "dimx"]);
    assert_eq!(var.units(), Some("V"));
    let data = var.as_numeric().expect("numeric data");
    assert_close(data[[1, 1]], 2.5);

    Ok(())
}

#[test]
fn test_convert_errors() -> Result<()> {
    let config = ChannelConfig {
        name: "Topo".to_string(),
        conversion_factor: 1.0,
        units: "Ang".to_string(),
        source: ConversionSource::Inherent,
    };

    // dz that cannot be broadcast to the field
    let mut ds = gxsm_dataset()?;
    ds.insert_variable(
        "dz",
        Variable::numeric(vec!["dimy"], ArrayD::from_shape_vec(vec![2], vec![1.0, 2.0])?),
    )?;
    assert!(matches!(
        convert_floatfield(&mut ds, &config),
        Err(GxsmError::ShapeMismatch { .. })
    ));
    // Nothing was removed on failure
    assert!(ds.contains_variable("FloatField"));

    // Missing dz
    let mut ds = gxsm_dataset()?;
    ds.remove_variable("dz");
    match convert_floatfield(&mut ds, &config) {
        Err(GxsmError::VariableNotFound { var }) => assert_eq!(var, "dz"),
        _ => panic!("Expected VariableNotFound error"),
    }

    // Text field
    let mut ds = gxsm_dataset()?;
    ds.remove_variable("FloatField");
    ds.insert_variable("FloatField", Variable::text("oops"))?;
    assert!(matches!(
        convert_floatfield(&mut ds, &config),
        Err(GxsmError::InvalidData { .. })
    ));

    Ok(())
}

#[test]
fn test_clean_up_metadata() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    let config = ChannelConfig {
        name: "Topo".to_string(),
        conversion_factor: 1.0,
        units: "Ang".to_string(),
        source: ConversionSource::Inherent,
    };
    convert_floatfield(&mut ds, &config)?;
    clean_up_metadata(&mut ds, &["Topo"])?;

    // Only the scan dimensions remain
    let dims: Vec<&String> = ds.dimensions().keys().collect();
    assert_eq!(dims, vec!["dimx", "dimy"]);

    // Variables: the channel and the scan coordinates
    assert_eq!(ds.variable_names(), vec!["Topo", "dimx", "dimy"]);

    // Dimension coordinates and metadata variables became attributes
    assert_eq!(ds.attr("time"), Some(&AttrValue::Double(42.0)));
    assert_eq!(ds.attr("value"), Some(&AttrValue::Doubles(vec![0.0])));
    assert_eq!(
        ds.attr("basename"),
        Some(&AttrValue::Str("/data/sample001.nc".to_string()))
    );
    assert_eq!(ds.attr(CURRENT_GAIN), Some(&AttrValue::Double(0.1)));

    // Pre-existing attributes survive
    assert_eq!(ds.attr("title").and_then(AttrValue::as_str), Some("test scan"));

    Ok(())
}

#[test]
fn test_clean_up_overwrites_attribute_of_same_name() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    ds.set_attr("basename", "stale global value");
    ds.set_attr(CURRENT_GAIN, 99.0);

    clean_up_metadata(&mut ds, &[])?;

    assert!(!ds.contains_variable("basename"));
    assert_eq!(
        ds.attr("basename"),
        Some(&AttrValue::Str("/data/sample001.nc".to_string()))
    );
    assert_eq!(ds.attr(CURRENT_GAIN), Some(&AttrValue::Double(0.1)));

    Ok(())
}

#[test]
fn test_clean_up_keeps_dimensions_of_kept_variables() -> Result<()> {
    // Without conversion FloatField still spans time/value, which must stay
    let mut ds = gxsm_dataset()?;
    clean_up_metadata(&mut ds, &[])?;

    assert!(ds.contains_variable("FloatField"));
    assert!(ds.contains_variable("dz"));
    assert!(ds.dimension_len("time").is_some());
    assert!(ds.contains_variable("time"));
    assert!(ds.dimension_len("value").is_some());

    assert!(!ds.contains_variable("basename"));
    assert!(ds.attr("basename").is_some());

    Ok(())
}

#[test]
fn test_preprocess_pipeline() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    ds.set_source("/scans/sample001-Xp-ADC2-Current.nc");

    let table = table_with(
        "ADC2-Current",
        ChannelEntry {
            name: Some("tunnel_current".to_string()),
            conversion_factor: None,
            units: None,
        },
    );

    let out = preprocess(ds, None, Some(&table), PreprocessOptions::default())?;

    let var = out.require_variable("tunnel_current")?;
    assert_eq!(var.units(), Some("nA"));
    let data = var.as_numeric().expect("numeric data");
    // count * 0.5 * 0.1
    assert_close(data[[1, 2]], 0.3);
    assert_eq!(out.attr(CURRENT_GAIN), Some(&AttrValue::Double(0.1)));

    Ok(())
}

#[test]
fn test_preprocess_table_keyed_by_multi_part_channel() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    ds.set_source("/scans/sample001-Xp-ADC2-Current.nc");

    let table = table_with(
        "ADC2-Current",
        ChannelEntry {
            name: Some("I".to_string()),
            conversion_factor: Some(10.0),
            units: Some("pA".to_string()),
        },
    );

    let out = preprocess(ds, None, Some(&table), PreprocessOptions::default())?;

    let var = out.require_variable("I")?;
    assert_eq!(var.units(), Some("pA"));
    let data = var.as_numeric().expect("numeric data");
    // count * 0.5 * 10
    assert_close(data[[0, 0]], 5.0);
    assert_close(data[[1, 2]], 30.0);
    assert!(!out.contains_variable("ADC2-Current"));

    Ok(())
}

#[test]
fn test_preprocess_without_demotion() -> Result<()> {
    let ds = gxsm_dataset()?;
    let options = PreprocessOptions {
        use_physical_units: false,
        allow_convert_from_metadata: false,
        demote_metadata: false,
    };

    let out = preprocess(ds, Some("ADC0"), None, options)?;
    let var = out.require_variable("ADC0")?;
    assert_eq!(var.units(), Some("raw"));
    assert!(out.contains_variable("basename"));
    assert!(out.contains_variable(CURRENT_GAIN));

    Ok(())
}

#[test]
fn test_preprocess_rejects_foreign_files() -> Result<()> {
    let mut ds = gxsm_dataset()?;
    ds.set_attr("Creator", "Nanonis");
    let result = preprocess(ds, Some("Topo"), None, PreprocessOptions::default());
    assert!(matches!(result, Err(GxsmError::NotGxsmFile { .. })));

    // No channel given and no source file to derive it from
    let ds = gxsm_dataset()?;
    let result = preprocess(ds, None, None, PreprocessOptions::default());
    assert!(matches!(result, Err(GxsmError::Generic(_))));

    Ok(())
}

#[test]
fn test_channel_from_source() {
    assert_eq!(
        channel_from_source(Path::new("/data/sample001-Xp-Topo.nc")).as_deref(),
        Some("Topo")
    );
    assert_eq!(
        channel_from_source(Path::new("sample001-Xm-ADC2-Current.nc")).as_deref(),
        Some("ADC2-Current")
    );
    assert_eq!(
        channel_from_source(Path::new("/data/sample001-M-Xm-ADC2-Current.nc")).as_deref(),
        Some("ADC2-Current")
    );
    // Without a scan-direction token the last part is the channel
    assert_eq!(
        channel_from_source(Path::new("sample001-Topo.nc")).as_deref(),
        Some("Topo")
    );
    assert_eq!(channel_from_source(Path::new("sample001-Xp.nc")), None);
    assert_eq!(channel_from_source(Path::new("sample001.nc")), None);
    assert_eq!(channel_from_source(Path::new("sample001-.nc")), None);
}

#[test]
fn test_inspection_output() -> Result<()> {
    let ds = gxsm_dataset()?;
    print_metadata(&ds)?;
    list_variables_and_dimensions(&ds)?;
    describe_variable(&ds, "FloatField")?;
    describe_variable(&ds, "basename")?;

    match describe_variable(&ds, "Height") {
        Err(GxsmError::VariableNotFound { var }) => assert_eq!(var, "Height"),
        _ => panic!("Expected VariableNotFound error"),
    }

    // An empty dataset prints placeholders rather than failing
    let empty = Dataset::new();
    print_metadata(&empty)?;
    list_variables_and_dimensions(&empty)?;

    Ok(())
}

#[test]
fn test_parallel_config() -> Result<()> {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());
    assert_eq!(ParallelConfig::new(Some(4)).num_threads, Some(4));

    // Keeping Rayon's default pool never touches the global pool
    default_config.setup_global_pool()?;

    let info = get_parallel_info();
    assert!(info.current_threads > 0);
    assert!(info.available_cores > 0);
    info.log_info();

    Ok(())
}
