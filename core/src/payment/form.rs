// core/src/payment/form.rs

use crate::account::{is_valid_email, AccountCredentials};
use crate::error::{CheckoutError, Result};
use crate::models::BillingInfo;
use crate::services::ProfileFields;

const MIN_PASSWORD_LEN: usize = 6;

/// Fields in the order they are checked. The first failing one gets focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
  Email,
  Password,
  ConfirmPassword,
  FirstName,
  LastName,
  Address,
  City,
  State,
  Zip,
  Country,
  Phone,
  Genre,
  Terms,
}

impl FormField {
  /// DOM id of the input, for focus-and-scroll.
  pub fn id(self) -> &'static str {
    match self {
      FormField::Email => "email",
      FormField::Password => "password",
      FormField::ConfirmPassword => "confirmPassword",
      FormField::FirstName => "firstName",
      FormField::LastName => "lastName",
      FormField::Address => "address",
      FormField::City => "city",
      FormField::State => "state",
      FormField::Zip => "zip",
      FormField::Country => "country",
      FormField::Phone => "phone",
      FormField::Genre => "musicGenre",
      FormField::Terms => "terms",
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      FormField::Email => "Please enter a valid email address.",
      FormField::Password => "Please enter a password of at least 6 characters.",
      FormField::ConfirmPassword => "Passwords do not match.",
      FormField::FirstName => "Please enter your first name.",
      FormField::LastName => "Please enter your last name.",
      FormField::Address => "Please enter your billing address.",
      FormField::City => "Please enter your city.",
      FormField::State => "Please enter your state or region.",
      FormField::Zip => "Please enter your ZIP or postal code.",
      FormField::Country => "Please select your country.",
      FormField::Phone => "Please enter your phone number.",
      FormField::Genre => "Please select your music genre.",
      FormField::Terms => "Please agree to the Terms of Service and Privacy Policy.",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
  pub email: String,
  pub password: String,
  pub confirm_password: String,
  pub login_mode: bool,
  pub billing: BillingInfo,
  pub music_genre: String,
  pub terms_agreed: bool,
}

fn blank(s: &str) -> bool {
  s.trim().is_empty()
}

impl CheckoutForm {
  /// First field that blocks submission: account fields (only when signed out), then billing,
  /// then genre, then terms.
  pub fn first_missing_field(&self, authenticated: bool) -> Option<FormField> {
    if !authenticated {
      if !is_valid_email(&self.email) {
        return Some(FormField::Email);
      }
      let min_len = if self.login_mode { 1 } else { MIN_PASSWORD_LEN };
      if self.password.len() < min_len {
        return Some(FormField::Password);
      }
      if !self.login_mode && self.password != self.confirm_password {
        return Some(FormField::ConfirmPassword);
      }
    }

    let b = &self.billing;
    let billing_checks = [
      (FormField::FirstName, &b.first_name),
      (FormField::LastName, &b.last_name),
      (FormField::Address, &b.address),
      (FormField::City, &b.city),
      (FormField::State, &b.state),
      (FormField::Zip, &b.zip),
      (FormField::Country, &b.country),
      (FormField::Phone, &b.phone),
    ];
    if let Some((field, _)) = billing_checks.iter().find(|(_, v)| blank(v)) {
      return Some(*field);
    }

    if blank(&self.music_genre) {
      return Some(FormField::Genre);
    }
    if !self.terms_agreed {
      return Some(FormField::Terms);
    }
    None
  }

  pub fn validate(&self, authenticated: bool) -> Result<()> {
    match self.first_missing_field(authenticated) {
      Some(field) => Err(CheckoutError::field(field.id(), field.message())),
      None => Ok(()),
    }
  }

  pub fn credentials(&self) -> AccountCredentials {
    AccountCredentials {
      email: self.email.clone(),
      password: self.password.clone(),
      login_mode: self.login_mode,
    }
  }

  pub fn profile(&self) -> ProfileFields {
    ProfileFields {
      first_name: self.billing.first_name.trim().to_string(),
      last_name: self.billing.last_name.trim().to_string(),
      phone: self.billing.phone.trim().to_string(),
      music_genre: self.music_genre.clone(),
    }
  }
}
