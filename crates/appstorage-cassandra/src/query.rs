//! CQL Statement Text
//!
//! Keyspace and table names come from validated configuration and are
//! formatted into the text; every caller-supplied value is a bind marker.
//!
//! ## Log part scan
//!
//! ```text
//! select offset_low, event from <ks>.<plog|wlog>
//!  where (<partition_id|wsid> = ?) and (offset_hi = ?)
//!    [and (offset_low >= ?)]      -- window starts after row 0
//!    [and (offset_low <= ?)]      -- window ends before row 4095
//!  order by offset_low
//! ```
//!
//! ## View scan
//!
//! ```text
//! select c_col, value from <ks>.view_records
//!  where (wsid = ?) and (qname = ?) and (p_key = ?)
//!    [and (c_col >= ?)]
//!    [and (c_col < ?)]
//! ```

use appstorage_core::LogId;

/// Partition-key column of a log table.
fn log_partition_column(log: &LogId) -> &'static str {
    match log {
        LogId::PLog(_) => "partition_id",
        LogId::WLog(_) => "wsid",
    }
}

pub fn get_record(keyspace: &str) -> String {
    format!(
        "select data from {keyspace}.records \
         where (wsid = ?) and (id_hi = ?) and (id_low = ?)"
    )
}

pub fn put_record(keyspace: &str) -> String {
    format!("insert into {keyspace}.records (wsid, id_hi, id_low, data) values (?, ?, ?, ?)")
}

pub fn put_log_event(keyspace: &str, log: &LogId) -> String {
    format!(
        "insert into {keyspace}.{table} ({column}, offset_hi, offset_low, event) \
         values (?, ?, ?, ?)",
        table = log.kind(),
        column = log_partition_column(log),
    )
}

pub fn read_log_part(keyspace: &str, log: &LogId, lower_bound: bool, upper_bound: bool) -> String {
    let mut cql = format!(
        "select offset_low, event from {keyspace}.{table} \
         where ({column} = ?) and (offset_hi = ?)",
        table = log.kind(),
        column = log_partition_column(log),
    );
    if lower_bound {
        cql.push_str(" and (offset_low >= ?)");
    }
    if upper_bound {
        cql.push_str(" and (offset_low <= ?)");
    }
    cql.push_str(" order by offset_low");
    cql
}

pub fn put_view_record(keyspace: &str) -> String {
    format!(
        "insert into {keyspace}.view_records (wsid, qname, p_key, c_col, value) \
         values (?, ?, ?, ?, ?)"
    )
}

pub fn get_view_record(keyspace: &str) -> String {
    format!(
        "select value from {keyspace}.view_records \
         where (wsid = ?) and (qname = ?) and (p_key = ?) and (c_col = ?)"
    )
}

pub fn scan_view(keyspace: &str, start: bool, finish: bool) -> String {
    let mut cql = format!(
        "select c_col, value from {keyspace}.view_records \
         where (wsid = ?) and (qname = ?) and (p_key = ?)"
    );
    if start {
        cql.push_str(" and (c_col >= ?)");
    }
    if finish {
        cql.push_str(" and (c_col < ?)");
    }
    cql
}

pub fn find_qname(keyspace: &str) -> String {
    format!("select id from {keyspace}.qnames where name = ?")
}

pub fn max_qname_id(keyspace: &str) -> String {
    format!("select max(id) from {keyspace}.qnames")
}

pub fn insert_qname(keyspace: &str) -> String {
    format!("insert into {keyspace}.qnames (name, id) values (?, ?) if not exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use appstorage_core::{PartitionId, WsId};

    const PLOG: LogId = LogId::PLog(PartitionId(1));
    const WLOG: LogId = LogId::WLog(WsId(1));

    #[test]
    fn test_log_part_unbounded_window() {
        assert_eq!(
            read_log_part("app1", &PLOG, false, false),
            "select offset_low, event from app1.plog \
             where (partition_id = ?) and (offset_hi = ?) order by offset_low"
        );
    }

    #[test]
    fn test_log_part_bounded_window() {
        assert_eq!(
            read_log_part("app1", &WLOG, true, true),
            "select offset_low, event from app1.wlog \
             where (wsid = ?) and (offset_hi = ?) \
             and (offset_low >= ?) and (offset_low <= ?) order by offset_low"
        );
        assert!(read_log_part("app1", &WLOG, true, false).ends_with(
            "and (offset_low >= ?) order by offset_low"
        ));
        assert!(read_log_part("app1", &WLOG, false, true).ends_with(
            "(offset_hi = ?) and (offset_low <= ?) order by offset_low"
        ));
    }

    #[test]
    fn test_log_inserts_target_their_table() {
        assert_eq!(
            put_log_event("app1", &PLOG),
            "insert into app1.plog (partition_id, offset_hi, offset_low, event) values (?, ?, ?, ?)"
        );
        assert_eq!(
            put_log_event("app1", &WLOG),
            "insert into app1.wlog (wsid, offset_hi, offset_low, event) values (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_view_scan_variants() {
        let base = "select c_col, value from app1.view_records \
                    where (wsid = ?) and (qname = ?) and (p_key = ?)";
        assert_eq!(scan_view("app1", false, false), base);
        assert_eq!(
            scan_view("app1", true, false),
            format!("{base} and (c_col >= ?)")
        );
        assert_eq!(scan_view("app1", false, true), format!("{base} and (c_col < ?)"));
        assert_eq!(
            scan_view("app1", true, true),
            format!("{base} and (c_col >= ?) and (c_col < ?)")
        );
    }

    #[test]
    fn test_qname_statements() {
        assert_eq!(find_qname("ks"), "select id from ks.qnames where name = ?");
        assert_eq!(max_qname_id("ks"), "select max(id) from ks.qnames");
        assert!(insert_qname("ks").ends_with("if not exists"));
    }

    #[test]
    fn test_record_statements() {
        assert_eq!(
            get_record("ks"),
            "select data from ks.records where (wsid = ?) and (id_hi = ?) and (id_low = ?)"
        );
        assert_eq!(
            put_record("ks"),
            "insert into ks.records (wsid, id_hi, id_low, data) values (?, ?, ?, ?)"
        );
    }
}
