use super::{Classification, WorkloadInstance};

use std::io::{self, Write};

const NAMESPACE_HEADER: &str = "NAMESPACE";
const NAME_HEADER: &str = "POD NAME";
const COLUMN_PADDING: usize = 2;

/// Writes both sets of a classification as a two-column (namespace, name) table, infra Pods first.
pub fn write_workload_table<W: Write>(out: &mut W, classification: &Classification) -> io::Result<()> {
    let rows: Vec<&WorkloadInstance> = classification
        .infra
        .iter()
        .chain(classification.application.iter())
        .collect();

    let namespace_width = rows
        .iter()
        .map(|workload| workload.namespace.len())
        .chain(std::iter::once(NAMESPACE_HEADER.len()))
        .max()
        .unwrap_or_default()
        + COLUMN_PADDING;

    write_row(out, NAMESPACE_HEADER, NAME_HEADER, namespace_width)?;
    write_row(
        out,
        &"-".repeat(NAMESPACE_HEADER.len()),
        &"-".repeat(NAME_HEADER.len()),
        namespace_width,
    )?;
    for workload in rows {
        write_row(out, &workload.namespace, &workload.name, namespace_width)?;
    }
    writeln!(out)
}

/// Writes the Pods that are about to be deleted, one `namespace/name` per line.
pub fn write_deletion_list<W: Write>(out: &mut W, application: &[WorkloadInstance]) -> io::Result<()> {
    writeln!(
        out,
        "The following applications pods will be deleted (NAMESPACE/POD):\n"
    )?;
    for workload in application {
        writeln!(out, " - {}", workload)?;
    }
    writeln!(out)
}

fn write_row<W: Write>(out: &mut W, namespace: &str, name: &str, width: usize) -> io::Result<()> {
    writeln!(out, "{:<width$}{}", namespace, name, width = width)
}
