use std::path::PathBuf;

use clap::Parser;
use espeleo_mesh::Vec3;
use espeleo_types::GraphMetricType;

/// Plan routes over a terrain mesh under several cost metrics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Binary or ASCII STL terrain mesh
    #[arg(short, long, required_unless_present = "init_config")]
    pub mesh: Option<PathBuf>,

    /// Start point as `x,y,z`; snapped to the nearest mesh vertex
    #[arg(
        short,
        long,
        value_parser = parse_point,
        allow_hyphen_values = true,
        required_unless_present = "init_config"
    )]
    pub source: Option<Vec3>,

    /// Goal point as `x,y,z`; snapped to the nearest mesh vertex
    #[arg(
        short,
        long,
        value_parser = parse_point,
        allow_hyphen_values = true,
        required_unless_present = "init_config"
    )]
    pub target: Option<Vec3>,

    /// Metric to plan with; repeat for several. Defaults to the config list
    #[arg(long = "metric", value_parser = parse_metric)]
    pub metrics: Vec<GraphMetricType>,

    /// Run the metrics in parallel
    #[arg(short, long)]
    pub concurrent: bool,

    /// Write the JSON plan report here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (defaults to ~/.espeleo/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the default config file and exit
    #[arg(long)]
    pub init_config: bool,

    /// Print per-term statistics for every route
    #[arg(long)]
    pub show_stats: bool,
}

/// Parse `"x,y,z"` into a point.
pub fn parse_point(raw: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let &[x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z but got '{raw}'"));
    };
    let coord = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{s}' is not a finite number"))
    };
    Ok(Vec3::new(coord(x)?, coord(y)?, coord(z)?))
}

fn parse_metric(raw: &str) -> Result<GraphMetricType, String> {
    raw.parse::<GraphMetricType>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_parses_with_spaces_and_negatives() {
        let p = parse_point("1.5, -2, 0.25").unwrap();
        assert_eq!(p, Vec3::new(1.5, -2.0, 0.25));
    }

    #[test]
    fn point_rejects_wrong_arity_and_garbage() {
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,2,3,4").is_err());
        assert!(parse_point("1,two,3").is_err());
        assert!(parse_point("1,NaN,3").is_err());
    }

    #[test]
    fn args_collect_repeated_metrics() {
        let args = Args::try_parse_from([
            "espeleo-plan",
            "--mesh",
            "cave.stl",
            "--source",
            "0,0,0",
            "--target",
            "-3,4.5,1",
            "--metric",
            "shortest",
            "--metric",
            "flattest-estimated",
            "--concurrent",
        ])
        .unwrap();
        assert_eq!(args.mesh, Some(PathBuf::from("cave.stl")));
        assert_eq!(args.target, Some(Vec3::new(-3.0, 4.5, 1.0)));
        assert_eq!(
            args.metrics,
            vec![GraphMetricType::Shortest, GraphMetricType::FlattestEstimated]
        );
        assert!(args.concurrent);
        assert!(!args.show_stats);
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let res = Args::try_parse_from([
            "espeleo-plan",
            "--mesh",
            "cave.stl",
            "--source",
            "0,0,0",
            "--target",
            "1,1,0",
            "--metric",
            "teleport",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn planning_requires_mesh_and_endpoints() {
        let err = Args::try_parse_from(["espeleo-plan", "--mesh", "cave.stl", "--source", "0,0,0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("--target"));
    }

    #[test]
    fn init_config_needs_no_mesh() {
        let args = Args::try_parse_from(["espeleo-plan", "--init-config"]).unwrap();
        assert!(args.init_config);
        assert!(args.mesh.is_none());
    }
}
