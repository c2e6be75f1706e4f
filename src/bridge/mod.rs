use duckdb::vtab::Value;
use libduckdb_sys::duckdb_free;
use libduckdb_sys::duckdb_get_int32;
use libduckdb_sys::duckdb_get_list_child;
use libduckdb_sys::duckdb_get_list_size;
use libduckdb_sys::duckdb_get_map_key;
use libduckdb_sys::duckdb_get_map_size;
use libduckdb_sys::duckdb_get_map_value;
use libduckdb_sys::duckdb_get_varchar;
use libduckdb_sys::duckdb_value;
use std::ffi::CStr;
use std::os::raw::c_void;

/// Typed access to named parameter values
pub(crate) trait ValueBridge {
    /// Gets the raw pointer to the underlying DuckDB value
    ///
    /// # Safety
    /// This method is unsafe as it accesses raw pointers and makes assumptions
    /// about the internal memory layout of DuckDB values
    fn get_value_ptr(&self) -> duckdb_value;

    /// Converts the value to a signed 32-bit integer
    fn to_int32(&self) -> i32 {
        unsafe { duckdb_get_int32(self.get_value_ptr()) }
    }

    /// Converts the value to a UTF-8 string
    ///
    /// The returned string is owned and memory is properly managed
    fn to_varchar(&self) -> String {
        unsafe {
            let varchar = duckdb_get_varchar(self.get_value_ptr());
            let c_str = CStr::from_ptr(varchar);
            let string = c_str.to_string_lossy().into_owned();
            duckdb_free(varchar as *mut c_void);
            string
        }
    }

    /// Converts the value to a vector of DuckDB values (list type)
    fn to_list(&self) -> Vec<Value> {
        unsafe {
            let size = duckdb_get_list_size(self.get_value_ptr());
            (0..size)
                .map(|index| Value::from(duckdb_get_list_child(self.get_value_ptr(), index)))
                .collect()
        }
    }

    /// Converts the value to key-value pairs in map order
    fn to_map_entries(&self) -> Vec<(Value, Value)> {
        unsafe {
            let size = duckdb_get_map_size(self.get_value_ptr());
            (0..size)
                .map(|index| {
                    (
                        Value::from(duckdb_get_map_key(self.get_value_ptr(), index)),
                        Value::from(duckdb_get_map_value(self.get_value_ptr(), index)),
                    )
                })
                .collect()
        }
    }
}

impl ValueBridge for Value {
    /// # DANGER: Highly unstable memory layout hack
    ///
    /// This implementation assumes that `Value` is a simple wrapper around a single
    /// `duckdb_value` field with no additional data or padding. Library updates can
    /// break this assumption.
    fn get_value_ptr(&self) -> duckdb_value {
        // Reinterpret the Value reference as the duckdb_value it wraps
        unsafe { *(self as *const Value as *const duckdb_value) }
    }
}
